//! Raw instruction encoding for Anchor-style programs.
//!
//! Payload layout: `sha256("global:<name>")[..8]` followed by every argument
//! in declared order, fixed width, little endian, with no length prefixes or
//! tags. Accounts are positional and checked against the call's declared
//! layout before anything is built.

use std::collections::BTreeMap;

use anchor_lang::AnchorSerialize;
use solana_sdk::{
    hash::hash,
    instruction::{AccountMeta, Instruction},
    pubkey::Pubkey,
};

use crate::error::{Result, ShineError};

pub const DISCRIMINATOR_LEN: usize = 8;

/// First 8 bytes of `sha256("global:" + name)`, the key of the program's
/// dispatch table.
pub fn discriminator(name: &str) -> [u8; DISCRIMINATOR_LEN] {
    let preimage = format!("global:{name}");
    let digest = hash(preimage.as_bytes()).to_bytes();
    let mut out = [0u8; DISCRIMINATOR_LEN];
    out.copy_from_slice(&digest[..DISCRIMINATOR_LEN]);
    out
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArgType {
    /// Fixed-length byte array
    Bytes(usize),
    U8,
    U16,
    U32,
    U64,
    Address,
}

impl ArgType {
    pub fn width(&self) -> usize {
        match self {
            ArgType::Bytes(len) => *len,
            ArgType::U8 => 1,
            ArgType::U16 => 2,
            ArgType::U32 => 4,
            ArgType::U64 => 8,
            ArgType::Address => 32,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ArgSpec {
    pub name: &'static str,
    pub ty: ArgType,
}

impl ArgSpec {
    pub const fn new(name: &'static str, ty: ArgType) -> Self {
        Self { name, ty }
    }
}

/// One positional account of a call, as declared by the handler's context.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AccountSlot {
    pub name: &'static str,
    pub is_signer: bool,
    pub is_writable: bool,
}

impl AccountSlot {
    pub const fn signer(name: &'static str, is_writable: bool) -> Self {
        Self { name, is_signer: true, is_writable }
    }

    pub const fn writable(name: &'static str) -> Self {
        Self { name, is_signer: false, is_writable: true }
    }

    pub const fn readonly(name: &'static str) -> Self {
        Self { name, is_signer: false, is_writable: false }
    }

    /// Bind this slot to a concrete address.
    pub fn meta(&self, address: Pubkey) -> AccountMeta {
        AccountMeta {
            pubkey: address,
            is_signer: self.is_signer,
            is_writable: self.is_writable,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ArgValue {
    Bytes(Vec<u8>),
    /// Wide enough to carry negative or oversized values so they can be
    /// rejected instead of silently truncated.
    Int(i128),
    Address(Pubkey),
}

impl From<u8> for ArgValue {
    fn from(v: u8) -> Self {
        ArgValue::Int(v.into())
    }
}

impl From<u16> for ArgValue {
    fn from(v: u16) -> Self {
        ArgValue::Int(v.into())
    }
}

impl From<u32> for ArgValue {
    fn from(v: u32) -> Self {
        ArgValue::Int(v.into())
    }
}

impl From<u64> for ArgValue {
    fn from(v: u64) -> Self {
        ArgValue::Int(v.into())
    }
}

impl From<i64> for ArgValue {
    fn from(v: i64) -> Self {
        ArgValue::Int(v.into())
    }
}

impl From<Pubkey> for ArgValue {
    fn from(v: Pubkey) -> Self {
        ArgValue::Address(v)
    }
}

impl From<Vec<u8>> for ArgValue {
    fn from(v: Vec<u8>) -> Self {
        ArgValue::Bytes(v)
    }
}

/// Named argument values for one call.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CallArgs(BTreeMap<String, ArgValue>);

impl CallArgs {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, name: &str, value: impl Into<ArgValue>) -> Self {
        self.0.insert(name.to_string(), value.into());
        self
    }

    pub fn get(&self, name: &str) -> Option<&ArgValue> {
        self.0.get(name)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.0.keys().map(String::as_str)
    }
}

/// Name, argument schema and account layout of one remote call. The
/// discriminator is computed once here and reused for every encoding.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallDescriptor {
    name: &'static str,
    discriminator: [u8; DISCRIMINATOR_LEN],
    args: Vec<ArgSpec>,
    accounts: Vec<AccountSlot>,
}

impl CallDescriptor {
    pub fn new(name: &'static str, args: &[ArgSpec], accounts: &[AccountSlot]) -> Self {
        Self {
            name,
            discriminator: discriminator(name),
            args: args.to_vec(),
            accounts: accounts.to_vec(),
        }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn discriminator(&self) -> [u8; DISCRIMINATOR_LEN] {
        self.discriminator
    }

    pub fn args(&self) -> &[ArgSpec] {
        &self.args
    }

    pub fn accounts(&self) -> &[AccountSlot] {
        &self.accounts
    }

    pub fn requires_signer(&self) -> bool {
        self.accounts.iter().any(|slot| slot.is_signer)
    }

    /// Exact payload size: discriminator plus every fixed-width argument.
    pub fn payload_len(&self) -> usize {
        DISCRIMINATOR_LEN + self.args.iter().map(|arg| arg.ty.width()).sum::<usize>()
    }

    /// Serialize `args` into the instruction payload.
    pub fn encode_args(&self, args: &CallArgs) -> Result<Vec<u8>> {
        if let Some(unknown) = args
            .names()
            .find(|name| !self.args.iter().any(|spec| spec.name == *name))
        {
            return Err(ShineError::schema(
                self.name,
                format!("unknown argument `{unknown}`"),
            ));
        }

        let mut payload = Vec::with_capacity(self.payload_len());
        payload.extend_from_slice(&self.discriminator);

        for spec in &self.args {
            let value = args.get(spec.name).ok_or_else(|| {
                ShineError::schema(self.name, format!("missing argument `{}`", spec.name))
            })?;
            self.put(spec, value, &mut payload)?;
        }

        debug_assert_eq!(payload.len(), self.payload_len());
        Ok(payload)
    }

    /// Build the instruction for `program_id`, checking `accounts` against
    /// the declared layout position by position.
    pub fn encode(
        &self,
        program_id: Pubkey,
        accounts: Vec<AccountMeta>,
        args: &CallArgs,
    ) -> Result<Instruction> {
        self.check_accounts(&accounts)?;
        let data = self.encode_args(args)?;
        Ok(Instruction {
            program_id,
            accounts,
            data,
        })
    }

    fn check_accounts(&self, accounts: &[AccountMeta]) -> Result<()> {
        if accounts.len() != self.accounts.len() {
            return Err(ShineError::schema(
                self.name,
                format!(
                    "expected {} accounts, got {}",
                    self.accounts.len(),
                    accounts.len()
                ),
            ));
        }

        for (index, (slot, meta)) in self.accounts.iter().zip(accounts).enumerate() {
            if slot.is_signer != meta.is_signer || slot.is_writable != meta.is_writable {
                return Err(ShineError::schema(
                    self.name,
                    format!(
                        "account #{index} `{}` must be signer={} writable={}",
                        slot.name, slot.is_signer, slot.is_writable
                    ),
                ));
            }
        }

        if self.requires_signer() && !accounts.iter().any(|meta| meta.is_signer) {
            return Err(ShineError::schema(self.name, "no signer account supplied"));
        }
        Ok(())
    }

    fn put(&self, spec: &ArgSpec, value: &ArgValue, out: &mut Vec<u8>) -> Result<()> {
        match (spec.ty, value) {
            (ArgType::Address, ArgValue::Address(address)) => {
                out.extend_from_slice(address.as_ref());
                Ok(())
            }
            (ArgType::Bytes(len), ArgValue::Bytes(bytes)) => {
                if bytes.len() != len {
                    return Err(ShineError::schema(
                        self.name,
                        format!(
                            "argument `{}` must be {len} bytes, got {}",
                            spec.name,
                            bytes.len()
                        ),
                    ));
                }
                out.extend_from_slice(bytes);
                Ok(())
            }
            (ArgType::U8, ArgValue::Int(v)) => self.put_uint::<u8>(spec, *v, out),
            (ArgType::U16, ArgValue::Int(v)) => self.put_uint::<u16>(spec, *v, out),
            (ArgType::U32, ArgValue::Int(v)) => self.put_uint::<u32>(spec, *v, out),
            (ArgType::U64, ArgValue::Int(v)) => self.put_uint::<u64>(spec, *v, out),
            (ty, value) => Err(ShineError::schema(
                self.name,
                format!("argument `{}` expects {ty:?}, got {value:?}", spec.name),
            )),
        }
    }

    fn put_uint<T>(&self, spec: &ArgSpec, value: i128, out: &mut Vec<u8>) -> Result<()>
    where
        T: TryFrom<i128> + AnchorSerialize,
    {
        let narrowed = T::try_from(value).map_err(|_| {
            ShineError::schema(
                self.name,
                format!(
                    "argument `{}` value {value} does not fit {:?}",
                    spec.name, spec.ty
                ),
            )
        })?;
        narrowed
            .serialize(out)
            .map_err(|e| ShineError::schema(self.name, e.to_string()))
    }
}
