use std::cmp::Ordering;
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::ops::{Add, Mul, Sub};

use byteorder::{BigEndian, ByteOrder};
use num_bigint::BigUint;
use num_traits::One;

use crate::modules::etypes::EType;
use crate::modules::format::{hex_byte_string, hex_text, FormatError};

pub type W64 = u64;
pub type Word64 = u64;

// Words -------------------------------------------------------------------------------------------

/// 256-bit unsigned word stored as `(low, high)` 128-bit limbs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct W256(pub u128, pub u128);

impl W256 {
  pub const ZERO: W256 = W256(0, 0);
  pub const MAX: W256 = W256(u128::MAX, u128::MAX);

  /// Big-endian decoding. Shorter inputs are left padded, longer inputs keep their last 32 bytes.
  pub fn from_bytes(bs: &[u8]) -> Self {
    let mut buf = [0u8; 32];
    let tail = if bs.len() > 32 { &bs[bs.len() - 32..] } else { bs };
    buf[32 - tail.len()..].copy_from_slice(tail);
    W256(BigEndian::read_u128(&buf[16..]), BigEndian::read_u128(&buf[..16]))
  }

  pub fn to_bytes(&self) -> [u8; 32] {
    let mut buf = [0u8; 32];
    BigEndian::write_u128(&mut buf[..16], self.1);
    BigEndian::write_u128(&mut buf[16..], self.0);
    buf
  }

  pub fn to_biguint(&self) -> BigUint {
    BigUint::from_bytes_be(&self.to_bytes())
  }

  /// Reduces `n` modulo 2^256.
  pub fn from_biguint(n: &BigUint) -> Self {
    W256::from_bytes(&n.to_bytes_be())
  }

  pub fn to_hex(&self) -> String {
    self.to_biguint().to_str_radix(16)
  }

  pub fn to_decimal(&self) -> String {
    self.to_biguint().to_str_radix(10)
  }

  pub fn is_zero(&self) -> bool {
    self.0 == 0 && self.1 == 0
  }
}

impl Ord for W256 {
  fn cmp(&self, other: &Self) -> Ordering {
    (self.1, self.0).cmp(&(other.1, other.0))
  }
}

impl PartialOrd for W256 {
  fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
    Some(self.cmp(other))
  }
}

impl From<u64> for W256 {
  fn from(v: u64) -> Self {
    W256(v as u128, 0)
  }
}

impl From<u128> for W256 {
  fn from(v: u128) -> Self {
    W256(v, 0)
  }
}

impl Add for W256 {
  type Output = W256;

  fn add(self, rhs: W256) -> W256 {
    W256::from_biguint(&(self.to_biguint() + rhs.to_biguint()))
  }
}

impl Sub for W256 {
  type Output = W256;

  fn sub(self, rhs: W256) -> W256 {
    let modulus = BigUint::one() << 256usize;
    W256::from_biguint(&(self.to_biguint() + modulus - rhs.to_biguint()))
  }
}

impl Mul for W256 {
  type Output = W256;

  fn mul(self, rhs: W256) -> W256 {
    W256::from_biguint(&(self.to_biguint() * rhs.to_biguint()))
  }
}

impl fmt::Display for W256 {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(&self.to_decimal())
  }
}

/// 160-bit account address.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct Addr(pub [u8; 20]);

impl Addr {
  pub fn from_hex(s: &str) -> Result<Self, FormatError> {
    let bs = hex_byte_string("address", s)?;
    if bs.len() > 20 {
      return Err(FormatError::TooLong { what: "address", max: 20, found: bs.len() });
    }
    let mut out = [0u8; 20];
    out[20 - bs.len()..].copy_from_slice(&bs);
    Ok(Addr(out))
  }

  pub fn to_w256(&self) -> W256 {
    W256::from_bytes(&self.0)
  }

  /// Keeps the low 20 bytes of the word.
  pub fn from_w256(w: W256) -> Self {
    let mut out = [0u8; 20];
    out.copy_from_slice(&w.to_bytes()[12..]);
    Addr(out)
  }
}

impl From<u64> for Addr {
  fn from(v: u64) -> Self {
    let mut out = [0u8; 20];
    out[12..].copy_from_slice(&v.to_be_bytes());
    Addr(out)
  }
}

impl fmt::Display for Addr {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(&hex_text(&self.0))
  }
}

// Symbolic IR -------------------------------------------------------------------------------------

/// Numbered placeholder for a value that is not known yet. It may stand in for any kind and has
/// no children.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct GVar {
  pub kind: EType,
  pub idx: i32,
}

impl GVar {
  pub fn new(kind: EType, idx: i32) -> Self {
    GVar { kind, idx }
  }

  pub fn buf(idx: i32) -> Self {
    GVar::new(EType::Buf, idx)
  }

  pub fn store(idx: i32) -> Self {
    GVar::new(EType::Storage, idx)
  }
}

impl fmt::Display for GVar {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self.kind {
      EType::Buf => write!(f, "BufVar({})", self.idx),
      EType::Storage => write!(f, "StoreVar({})", self.idx),
      kind => write!(f, "{}Var({})", kind, self.idx),
    }
  }
}

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Expr {
  // Identifiers
  Lit(W256),
  Var(String),
  GVar(GVar),

  // Bytes
  LitByte(u8),
  IndexWord(Box<Expr>, Box<Expr>),
  EqByte(Box<Expr>, Box<Expr>),
  JoinBytes(Box<[Expr; 32]>),

  // Control Flow
  Partial(Vec<Prop>, Traces, PartialExec),
  Failure(Vec<Prop>, Traces, EvmError),
  Success(Vec<Prop>, Traces, Box<Expr>, BTreeMap<Expr, Expr>),
  ITE(Box<Expr>, Box<Expr>, Box<Expr>),

  // Integers
  Add(Box<Expr>, Box<Expr>),
  Sub(Box<Expr>, Box<Expr>),
  Mul(Box<Expr>, Box<Expr>),
  Div(Box<Expr>, Box<Expr>),
  SDiv(Box<Expr>, Box<Expr>),
  Mod(Box<Expr>, Box<Expr>),
  SMod(Box<Expr>, Box<Expr>),
  AddMod(Box<Expr>, Box<Expr>, Box<Expr>),
  MulMod(Box<Expr>, Box<Expr>, Box<Expr>),
  Exp(Box<Expr>, Box<Expr>),
  SEx(Box<Expr>, Box<Expr>),
  Min(Box<Expr>, Box<Expr>),
  Max(Box<Expr>, Box<Expr>),

  // Booleans
  LT(Box<Expr>, Box<Expr>),
  GT(Box<Expr>, Box<Expr>),
  LEq(Box<Expr>, Box<Expr>),
  GEq(Box<Expr>, Box<Expr>),
  SLT(Box<Expr>, Box<Expr>),
  SGT(Box<Expr>, Box<Expr>),
  Eq(Box<Expr>, Box<Expr>),
  IsZero(Box<Expr>),

  // Bits
  And(Box<Expr>, Box<Expr>),
  Or(Box<Expr>, Box<Expr>),
  Xor(Box<Expr>, Box<Expr>),
  Not(Box<Expr>),
  SHL(Box<Expr>, Box<Expr>),
  SHR(Box<Expr>, Box<Expr>),
  SAR(Box<Expr>, Box<Expr>),

  // Hashes
  Keccak(Box<Expr>),
  SHA256(Box<Expr>),

  // Block context
  Origin,
  BlockHash(Box<Expr>),
  Coinbase,
  Timestamp,
  BlockNumber,
  PrevRandao,
  GasLimit,
  ChainId,
  BaseFee,

  // Tx context
  TxValue,

  // Frame context: contract identity, and (frame index, pc)
  Balance(String),
  Gas(i32, i32),

  // Code
  CodeSize(Box<Expr>),
  CodeHash(Box<Expr>),

  // Logs
  LogEntry(Box<Expr>, Box<Expr>, Vec<Expr>),

  // Contract
  C {
    code: ContractCode,
    storage: Box<Expr>,
    balance: Box<Expr>,
    nonce: Option<W64>,
  },

  // Addresses
  SymAddr(String),
  LitAddr(Addr),
  WAddr(Box<Expr>),

  // Storage
  ConcreteStore(BTreeMap<W256, W256>),
  AbstractStore(Box<Expr>, Option<W256>),

  SLoad(Box<Expr>, Box<Expr>, Box<Expr>),
  SStore(Box<Expr>, Box<Expr>, Box<Expr>, Box<Expr>),

  // Buffers
  ConcreteBuf(Vec<u8>),
  AbstractBuf(String),

  ReadWord(Box<Expr>, Box<Expr>),
  ReadByte(Box<Expr>, Box<Expr>),
  WriteWord(Box<Expr>, Box<Expr>, Box<Expr>),
  WriteByte(Box<Expr>, Box<Expr>, Box<Expr>),
  CopySlice(Box<Expr>, Box<Expr>, Box<Expr>, Box<Expr>, Box<Expr>),

  BufLength(Box<Expr>),

  // Creation and calls; `cont` is the rest of the execution
  Create {
    value: Box<Expr>,
    offset: Box<Expr>,
    size: Box<Expr>,
    memory: Box<Expr>,
    logs: Vec<Expr>,
    storage: Box<Expr>,
    cont: Box<Expr>,
  },
  Create2 {
    value: Box<Expr>,
    offset: Box<Expr>,
    size: Box<Expr>,
    salt: Box<Expr>,
    memory: Box<Expr>,
    logs: Vec<Expr>,
    storage: Box<Expr>,
    cont: Box<Expr>,
  },
  Call {
    gas: Box<Expr>,
    target: Option<Box<Expr>>,
    value: Box<Expr>,
    args: Box<Expr>,
    ret_offset: Box<Expr>,
    ret_size: Box<Expr>,
    logs: Vec<Expr>,
    cont: Box<Expr>,
  },
  CallCode {
    gas: Box<Expr>,
    target: Option<Box<Expr>>,
    value: Box<Expr>,
    args: Box<Expr>,
    ret_offset: Box<Expr>,
    ret_size: Box<Expr>,
    logs: Vec<Expr>,
    cont: Box<Expr>,
  },
  DelegateCall {
    gas: Box<Expr>,
    target: Option<Box<Expr>>,
    args: Box<Expr>,
    ret_offset: Box<Expr>,
    ret_size: Box<Expr>,
    logs: Vec<Expr>,
    cont: Box<Expr>,
  },
  StaticCall {
    gas: Box<Expr>,
    target: Option<Box<Expr>>,
    args: Box<Expr>,
    ret_offset: Box<Expr>,
    ret_size: Box<Expr>,
    logs: Vec<Expr>,
    cont: Box<Expr>,
  },
}

impl Expr {
  /// Value kind of the node, derived from its constructor alone.
  pub fn kind(&self) -> EType {
    match self {
      Expr::GVar(g) => g.kind,

      Expr::LitByte(_) | Expr::IndexWord(..) | Expr::ReadByte(..) => EType::Byte,

      Expr::Partial(..)
      | Expr::Failure(..)
      | Expr::Success(..)
      | Expr::ITE(..)
      | Expr::Create { .. }
      | Expr::Create2 { .. }
      | Expr::Call { .. }
      | Expr::CallCode { .. }
      | Expr::DelegateCall { .. }
      | Expr::StaticCall { .. } => EType::End,

      Expr::LogEntry(..) => EType::Log,
      Expr::C { .. } => EType::Contract,
      Expr::SymAddr(_) | Expr::LitAddr(_) | Expr::WAddr(_) => EType::Addr,
      Expr::ConcreteStore(_) | Expr::AbstractStore(..) | Expr::SStore(..) => EType::Storage,

      Expr::ConcreteBuf(_)
      | Expr::AbstractBuf(_)
      | Expr::WriteWord(..)
      | Expr::WriteByte(..)
      | Expr::CopySlice(..) => EType::Buf,

      Expr::Lit(_)
      | Expr::Var(_)
      | Expr::EqByte(..)
      | Expr::JoinBytes(_)
      | Expr::Add(..)
      | Expr::Sub(..)
      | Expr::Mul(..)
      | Expr::Div(..)
      | Expr::SDiv(..)
      | Expr::Mod(..)
      | Expr::SMod(..)
      | Expr::AddMod(..)
      | Expr::MulMod(..)
      | Expr::Exp(..)
      | Expr::SEx(..)
      | Expr::Min(..)
      | Expr::Max(..)
      | Expr::LT(..)
      | Expr::GT(..)
      | Expr::LEq(..)
      | Expr::GEq(..)
      | Expr::SLT(..)
      | Expr::SGT(..)
      | Expr::Eq(..)
      | Expr::IsZero(_)
      | Expr::And(..)
      | Expr::Or(..)
      | Expr::Xor(..)
      | Expr::Not(_)
      | Expr::SHL(..)
      | Expr::SHR(..)
      | Expr::SAR(..)
      | Expr::Keccak(_)
      | Expr::SHA256(_)
      | Expr::Origin
      | Expr::BlockHash(_)
      | Expr::Coinbase
      | Expr::Timestamp
      | Expr::BlockNumber
      | Expr::PrevRandao
      | Expr::GasLimit
      | Expr::ChainId
      | Expr::BaseFee
      | Expr::TxValue
      | Expr::Balance(_)
      | Expr::Gas(..)
      | Expr::CodeSize(_)
      | Expr::CodeHash(_)
      | Expr::SLoad(..)
      | Expr::ReadWord(..)
      | Expr::BufLength(_) => EType::Word,
    }
  }

  /// Constructor name.
  pub fn tag(&self) -> &'static str {
    match self {
      Expr::Lit(_) => "Lit",
      Expr::Var(_) => "Var",
      Expr::GVar(_) => "GVar",
      Expr::LitByte(_) => "LitByte",
      Expr::IndexWord(..) => "IndexWord",
      Expr::EqByte(..) => "EqByte",
      Expr::JoinBytes(_) => "JoinBytes",
      Expr::Partial(..) => "Partial",
      Expr::Failure(..) => "Failure",
      Expr::Success(..) => "Success",
      Expr::ITE(..) => "ITE",
      Expr::Add(..) => "Add",
      Expr::Sub(..) => "Sub",
      Expr::Mul(..) => "Mul",
      Expr::Div(..) => "Div",
      Expr::SDiv(..) => "SDiv",
      Expr::Mod(..) => "Mod",
      Expr::SMod(..) => "SMod",
      Expr::AddMod(..) => "AddMod",
      Expr::MulMod(..) => "MulMod",
      Expr::Exp(..) => "Exp",
      Expr::SEx(..) => "SEx",
      Expr::Min(..) => "Min",
      Expr::Max(..) => "Max",
      Expr::LT(..) => "LT",
      Expr::GT(..) => "GT",
      Expr::LEq(..) => "LEq",
      Expr::GEq(..) => "GEq",
      Expr::SLT(..) => "SLT",
      Expr::SGT(..) => "SGT",
      Expr::Eq(..) => "Eq",
      Expr::IsZero(_) => "IsZero",
      Expr::And(..) => "And",
      Expr::Or(..) => "Or",
      Expr::Xor(..) => "Xor",
      Expr::Not(_) => "Not",
      Expr::SHL(..) => "SHL",
      Expr::SHR(..) => "SHR",
      Expr::SAR(..) => "SAR",
      Expr::Keccak(_) => "Keccak",
      Expr::SHA256(_) => "SHA256",
      Expr::Origin => "Origin",
      Expr::BlockHash(_) => "BlockHash",
      Expr::Coinbase => "Coinbase",
      Expr::Timestamp => "Timestamp",
      Expr::BlockNumber => "BlockNumber",
      Expr::PrevRandao => "PrevRandao",
      Expr::GasLimit => "GasLimit",
      Expr::ChainId => "ChainId",
      Expr::BaseFee => "BaseFee",
      Expr::TxValue => "TxValue",
      Expr::Balance(_) => "Balance",
      Expr::Gas(..) => "Gas",
      Expr::CodeSize(_) => "CodeSize",
      Expr::CodeHash(_) => "CodeHash",
      Expr::LogEntry(..) => "LogEntry",
      Expr::C { .. } => "C",
      Expr::SymAddr(_) => "SymAddr",
      Expr::LitAddr(_) => "LitAddr",
      Expr::WAddr(_) => "WAddr",
      Expr::ConcreteStore(_) => "ConcreteStore",
      Expr::AbstractStore(..) => "AbstractStore",
      Expr::SLoad(..) => "SLoad",
      Expr::SStore(..) => "SStore",
      Expr::ConcreteBuf(_) => "ConcreteBuf",
      Expr::AbstractBuf(_) => "AbstractBuf",
      Expr::ReadWord(..) => "ReadWord",
      Expr::ReadByte(..) => "ReadByte",
      Expr::WriteWord(..) => "WriteWord",
      Expr::WriteByte(..) => "WriteByte",
      Expr::CopySlice(..) => "CopySlice",
      Expr::BufLength(_) => "BufLength",
      Expr::Create { .. } => "Create",
      Expr::Create2 { .. } => "Create2",
      Expr::Call { .. } => "Call",
      Expr::CallCode { .. } => "CallCode",
      Expr::DelegateCall { .. } => "DelegateCall",
      Expr::StaticCall { .. } => "StaticCall",
    }
  }

  /// Direct expression operands in declared order, each paired with the kind it must have.
  ///
  /// Expressions reached only through propositions, traces, errors or partial-execution records
  /// are not operands; the contract code of `C` is.
  pub fn typed_operands(&self) -> Vec<(EType, &Expr)> {
    use EType::{Addr as A, Buf as B, Byte as Y, Contract as K, End as N, Log as L, Storage as S, Word as W};

    match self {
      Expr::Lit(_)
      | Expr::Var(_)
      | Expr::GVar(_)
      | Expr::LitByte(_)
      | Expr::Origin
      | Expr::Coinbase
      | Expr::Timestamp
      | Expr::BlockNumber
      | Expr::PrevRandao
      | Expr::GasLimit
      | Expr::ChainId
      | Expr::BaseFee
      | Expr::TxValue
      | Expr::Balance(_)
      | Expr::Gas(..)
      | Expr::SymAddr(_)
      | Expr::LitAddr(_)
      | Expr::ConcreteStore(_)
      | Expr::ConcreteBuf(_)
      | Expr::AbstractBuf(_)
      | Expr::Partial(..)
      | Expr::Failure(..) => vec![],

      Expr::IndexWord(a, b) => vec![(W, &**a), (W, &**b)],
      Expr::EqByte(a, b) => vec![(Y, &**a), (Y, &**b)],
      Expr::JoinBytes(bytes) => bytes.iter().map(|b| (Y, b)).collect(),

      Expr::Success(_, _, buf, contracts) => {
        let mut ops = vec![(B, &**buf)];
        for (addr, contract) in contracts {
          ops.push((A, addr));
          ops.push((K, contract));
        }
        ops
      }
      Expr::ITE(c, t, e) => vec![(W, &**c), (N, &**t), (N, &**e)],

      Expr::Add(a, b)
      | Expr::Sub(a, b)
      | Expr::Mul(a, b)
      | Expr::Div(a, b)
      | Expr::SDiv(a, b)
      | Expr::Mod(a, b)
      | Expr::SMod(a, b)
      | Expr::Exp(a, b)
      | Expr::SEx(a, b)
      | Expr::Min(a, b)
      | Expr::Max(a, b)
      | Expr::LT(a, b)
      | Expr::GT(a, b)
      | Expr::LEq(a, b)
      | Expr::GEq(a, b)
      | Expr::SLT(a, b)
      | Expr::SGT(a, b)
      | Expr::Eq(a, b)
      | Expr::And(a, b)
      | Expr::Or(a, b)
      | Expr::Xor(a, b)
      | Expr::SHL(a, b)
      | Expr::SHR(a, b)
      | Expr::SAR(a, b) => vec![(W, &**a), (W, &**b)],

      Expr::AddMod(a, b, c) | Expr::MulMod(a, b, c) => vec![(W, &**a), (W, &**b), (W, &**c)],
      Expr::IsZero(a) | Expr::Not(a) | Expr::BlockHash(a) | Expr::WAddr(a) => vec![(W, &**a)],
      Expr::Keccak(a) | Expr::SHA256(a) | Expr::BufLength(a) => vec![(B, &**a)],
      Expr::CodeSize(a) | Expr::CodeHash(a) | Expr::AbstractStore(a, _) => vec![(A, &**a)],

      Expr::LogEntry(addr, data, topics) => {
        let mut ops = vec![(W, &**addr), (B, &**data)];
        ops.extend(topics.iter().map(|t| (W, t)));
        ops
      }

      Expr::C { code, storage, balance, .. } => {
        let mut ops = code.typed_operands();
        ops.push((S, &**storage));
        ops.push((W, &**balance));
        ops
      }

      Expr::SLoad(addr, slot, store) => vec![(A, &**addr), (W, &**slot), (S, &**store)],
      Expr::SStore(addr, slot, val, store) => vec![(A, &**addr), (W, &**slot), (W, &**val), (S, &**store)],

      Expr::ReadWord(idx, buf) | Expr::ReadByte(idx, buf) => vec![(W, &**idx), (B, &**buf)],
      Expr::WriteWord(idx, val, buf) => vec![(W, &**idx), (W, &**val), (B, &**buf)],
      Expr::WriteByte(idx, val, buf) => vec![(W, &**idx), (Y, &**val), (B, &**buf)],
      Expr::CopySlice(src_off, dst_off, size, src, dst) => {
        vec![(W, &**src_off), (W, &**dst_off), (W, &**size), (B, &**src), (B, &**dst)]
      }

      Expr::Create { value, offset, size, memory, logs, storage, cont } => {
        let mut ops = vec![(W, &**value), (W, &**offset), (W, &**size), (B, &**memory)];
        ops.extend(logs.iter().map(|l| (L, l)));
        ops.push((S, &**storage));
        ops.push((N, &**cont));
        ops
      }
      Expr::Create2 { value, offset, size, salt, memory, logs, storage, cont } => {
        let mut ops = vec![(W, &**value), (W, &**offset), (W, &**size), (W, &**salt), (B, &**memory)];
        ops.extend(logs.iter().map(|l| (L, l)));
        ops.push((S, &**storage));
        ops.push((N, &**cont));
        ops
      }
      Expr::Call { gas, target, value, args, ret_offset, ret_size, logs, cont }
      | Expr::CallCode { gas, target, value, args, ret_offset, ret_size, logs, cont } => {
        let mut ops = vec![(W, &**gas)];
        ops.extend(target.iter().map(|t| (A, &**t)));
        ops.extend([(W, &**value), (B, &**args), (W, &**ret_offset), (W, &**ret_size)]);
        ops.extend(logs.iter().map(|l| (L, l)));
        ops.push((N, &**cont));
        ops
      }
      Expr::DelegateCall { gas, target, args, ret_offset, ret_size, logs, cont }
      | Expr::StaticCall { gas, target, args, ret_offset, ret_size, logs, cont } => {
        let mut ops = vec![(W, &**gas)];
        ops.extend(target.iter().map(|t| (A, &**t)));
        ops.extend([(B, &**args), (W, &**ret_offset), (W, &**ret_size)]);
        ops.extend(logs.iter().map(|l| (L, l)));
        ops.push((N, &**cont));
        ops
      }
    }
  }

  pub fn is_lit(&self) -> bool {
    matches!(self, Expr::Lit(_))
  }
}

fn write_list<T: fmt::Display>(f: &mut fmt::Formatter<'_>, items: impl IntoIterator<Item = T>) -> fmt::Result {
  write!(f, "[")?;
  for (i, item) in items.into_iter().enumerate() {
    if i > 0 {
      write!(f, ", ")?;
    }
    write!(f, "{}", item)?;
  }
  write!(f, "]")
}

impl fmt::Display for Expr {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    let tag = self.tag();
    match self {
      Expr::Lit(val) => write!(f, "Lit(0x{})", val.to_hex()),
      Expr::Var(name) => write!(f, "Var({})", name),
      Expr::GVar(gvar) => write!(f, "GVar({})", gvar),
      Expr::LitByte(val) => write!(f, "LitByte({:#04x})", val),
      Expr::JoinBytes(bytes) => {
        write!(f, "JoinBytes")?;
        write_list(f, bytes.iter())
      }
      Expr::Partial(props, _, exec) => {
        write!(f, "Partial(")?;
        write_list(f, props)?;
        write!(f, ", {})", exec)
      }
      Expr::Failure(props, _, err) => {
        write!(f, "Failure(")?;
        write_list(f, props)?;
        write!(f, ", {})", err)
      }
      Expr::Success(props, _, buf, contracts) => {
        write!(f, "Success(")?;
        write_list(f, props)?;
        write!(f, ", {}, ", buf)?;
        write_list(f, contracts.iter().map(|(k, v)| format!("{} => {}", k, v)))?;
        write!(f, ")")
      }
      Expr::Origin
      | Expr::Coinbase
      | Expr::Timestamp
      | Expr::BlockNumber
      | Expr::PrevRandao
      | Expr::GasLimit
      | Expr::ChainId
      | Expr::BaseFee
      | Expr::TxValue => f.write_str(tag),
      Expr::Balance(who) => write!(f, "Balance({})", who),
      Expr::Gas(frame, pc) => write!(f, "Gas({}, {})", frame, pc),
      Expr::SymAddr(name) => write!(f, "SymAddr({})", name),
      Expr::LitAddr(addr) => write!(f, "LitAddr({})", addr),
      Expr::ConcreteStore(store) => {
        write!(f, "ConcreteStore")?;
        write_list(f, store.iter().map(|(k, v)| format!("{} => {}", k, v)))
      }
      Expr::AbstractStore(addr, idx) => match idx {
        Some(i) => write!(f, "AbstractStore({}, {})", addr, i),
        None => write!(f, "AbstractStore({})", addr),
      },
      Expr::ConcreteBuf(buf) => write!(f, "ConcreteBuf({})", hex_text(buf)),
      Expr::AbstractBuf(name) => write!(f, "AbstractBuf({})", name),
      Expr::LogEntry(addr, buf, topics) => {
        write!(f, "LogEntry({}, {}, ", addr, buf)?;
        write_list(f, topics)?;
        write!(f, ")")
      }
      Expr::C { code, storage, balance, nonce } => {
        write!(f, "C {{ code: {}, storage: {}, balance: {}, nonce: {:?} }}", code, storage, balance, nonce)
      }
      // every remaining node renders as its tag applied to its operands
      Expr::IndexWord(..)
      | Expr::EqByte(..)
      | Expr::ITE(..)
      | Expr::Add(..)
      | Expr::Sub(..)
      | Expr::Mul(..)
      | Expr::Div(..)
      | Expr::SDiv(..)
      | Expr::Mod(..)
      | Expr::SMod(..)
      | Expr::AddMod(..)
      | Expr::MulMod(..)
      | Expr::Exp(..)
      | Expr::SEx(..)
      | Expr::Min(..)
      | Expr::Max(..)
      | Expr::LT(..)
      | Expr::GT(..)
      | Expr::LEq(..)
      | Expr::GEq(..)
      | Expr::SLT(..)
      | Expr::SGT(..)
      | Expr::Eq(..)
      | Expr::IsZero(_)
      | Expr::And(..)
      | Expr::Or(..)
      | Expr::Xor(..)
      | Expr::Not(_)
      | Expr::SHL(..)
      | Expr::SHR(..)
      | Expr::SAR(..)
      | Expr::Keccak(_)
      | Expr::SHA256(_)
      | Expr::BlockHash(_)
      | Expr::CodeSize(_)
      | Expr::CodeHash(_)
      | Expr::WAddr(_)
      | Expr::SLoad(..)
      | Expr::SStore(..)
      | Expr::ReadWord(..)
      | Expr::ReadByte(..)
      | Expr::WriteWord(..)
      | Expr::WriteByte(..)
      | Expr::CopySlice(..)
      | Expr::BufLength(_)
      | Expr::Create { .. }
      | Expr::Create2 { .. }
      | Expr::Call { .. }
      | Expr::CallCode { .. }
      | Expr::DelegateCall { .. }
      | Expr::StaticCall { .. } => {
        write!(f, "{}(", tag)?;
        for (i, (_, op)) in self.typed_operands().into_iter().enumerate() {
          if i > 0 {
            write!(f, ", ")?;
          }
          write!(f, "{}", op)?;
        }
        write!(f, ")")
      }
    }
  }
}

// Propositions -----------------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Prop {
  PEq(Expr, Expr),
  PLT(Expr, Expr),
  PGT(Expr, Expr),
  PGEq(Expr, Expr),
  PLEq(Expr, Expr),
  PNeg(Box<Prop>),
  PAnd(Box<Prop>, Box<Prop>),
  POr(Box<Prop>, Box<Prop>),
  PImpl(Box<Prop>, Box<Prop>),
  PBool(bool),
}

impl fmt::Display for Prop {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      Prop::PEq(a, b) => write!(f, "PEq({}, {})", a, b),
      Prop::PLT(a, b) => write!(f, "PLT({}, {})", a, b),
      Prop::PGT(a, b) => write!(f, "PGT({}, {})", a, b),
      Prop::PGEq(a, b) => write!(f, "PGEq({}, {})", a, b),
      Prop::PLEq(a, b) => write!(f, "PLEq({}, {})", a, b),
      Prop::PNeg(a) => write!(f, "PNeg({})", a),
      Prop::PAnd(a, b) => write!(f, "PAnd({}, {})", a, b),
      Prop::POr(a, b) => write!(f, "POr({}, {})", a, b),
      Prop::PImpl(a, b) => write!(f, "PImpl({}, {})", a, b),
      Prop::PBool(b) => write!(f, "PBool({})", b),
    }
  }
}

// Errors -----------------------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum EvmError {
  BalanceTooLow(Box<Expr>, Box<Expr>),
  UnrecognizedOpcode(u8),
  SelfDestruction,
  StackUnderrun,
  BadJumpDestination,
  Revert(Box<Expr>),
  OutOfGas(u64, u64),
  StackLimitExceeded,
  IllegalOverflow,
  StateChangeWhileStatic,
  InvalidMemoryAccess,
  CallDepthLimitReached,
  MaxCodeSizeExceeded(W256, W256),
  MaxInitCodeSizeExceeded(W256, Box<Expr>),
  InvalidFormat,
  PrecompileFailure,
  ReturnDataOutOfBounds,
  NonceOverflow,
  BadCheatCode(u32),
  NonexistentFork(i32),
}

impl fmt::Display for EvmError {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      EvmError::BalanceTooLow(a, b) => write!(f, "Balance too low: {} < {}", a, b),
      EvmError::UnrecognizedOpcode(op) => write!(f, "Unrecognized opcode: {}", op),
      EvmError::SelfDestruction => write!(f, "Self destruction"),
      EvmError::StackUnderrun => write!(f, "Stack underrun"),
      EvmError::BadJumpDestination => write!(f, "Bad jump destination"),
      EvmError::Revert(buf) => write!(f, "Revert: {}", buf),
      EvmError::OutOfGas(used, limit) => write!(f, "Out of gas: {} / {}", used, limit),
      EvmError::StackLimitExceeded => write!(f, "Stack limit exceeded"),
      EvmError::IllegalOverflow => write!(f, "Illegal overflow"),
      EvmError::StateChangeWhileStatic => write!(f, "State change while static"),
      EvmError::InvalidMemoryAccess => write!(f, "Invalid memory access"),
      EvmError::CallDepthLimitReached => write!(f, "Call depth limit reached"),
      EvmError::MaxCodeSizeExceeded(current, max) => write!(f, "Max code size exceeded: {} / {}", current, max),
      EvmError::MaxInitCodeSizeExceeded(max, current) => {
        write!(f, "Max init code size exceeded: {} / {}", current, max)
      }
      EvmError::InvalidFormat => write!(f, "Invalid format"),
      EvmError::PrecompileFailure => write!(f, "Precompile failure"),
      EvmError::ReturnDataOutOfBounds => write!(f, "Return data out of bounds"),
      EvmError::NonceOverflow => write!(f, "Nonce overflow"),
      EvmError::BadCheatCode(selector) => write!(f, "Bad cheat code: {:#010x}", selector),
      EvmError::NonexistentFork(fork) => write!(f, "Nonexistent fork: {}", fork),
    }
  }
}

/// Why exploration of a path stopped before reaching a terminal opcode.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum PartialExec {
  UnexpectedSymbolicArg { pc: i32, msg: String, args: Vec<Expr> },
  MaxIterationsReached { pc: i32, addr: Box<Expr> },
  JumpIntoSymbolicCode { pc: i32, jump_dst: i32 },
}

impl fmt::Display for PartialExec {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      PartialExec::UnexpectedSymbolicArg { pc, msg, args } => {
        write!(f, "UnexpectedSymbolicArg @ {}: {} ", pc, msg)?;
        write_list(f, args)
      }
      PartialExec::MaxIterationsReached { pc, addr } => write!(f, "MaxIterationsReached @ {} in {}", pc, addr),
      PartialExec::JumpIntoSymbolicCode { pc, jump_dst } => write!(f, "JumpIntoSymbolicCode @ {} -> {}", pc, jump_dst),
    }
  }
}

// Contracts --------------------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Contract {
  pub code: ContractCode,
  pub storage: Expr,
  pub orig_storage: Expr,
  pub balance: Expr,
  pub nonce: Option<W64>,
  pub external: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ContractCode {
  /// Code not resolved yet, identified by the address holding it.
  UnKnownCode(Box<Expr>),
  /// Concrete initcode followed by a (possibly symbolic) constructor argument buffer.
  InitCode(Vec<u8>, Box<Expr>),
  RuntimeCode(RuntimeCodeStruct),
}

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum RuntimeCodeStruct {
  ConcreteRuntimeCode(Vec<u8>),
  SymbolicRuntimeCode(Vec<Expr>),
}

impl ContractCode {
  pub fn typed_operands(&self) -> Vec<(EType, &Expr)> {
    match self {
      ContractCode::UnKnownCode(addr) => vec![(EType::Addr, &**addr)],
      ContractCode::InitCode(_, args) => vec![(EType::Buf, &**args)],
      ContractCode::RuntimeCode(RuntimeCodeStruct::ConcreteRuntimeCode(_)) => vec![],
      ContractCode::RuntimeCode(RuntimeCodeStruct::SymbolicRuntimeCode(ops)) => {
        ops.iter().map(|b| (EType::Byte, b)).collect()
      }
    }
  }
}

impl fmt::Display for ContractCode {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      ContractCode::UnKnownCode(addr) => write!(f, "UnKnownCode({})", addr),
      ContractCode::InitCode(code, args) => write!(f, "InitCode(0x{}, {})", hex::encode(code), args),
      ContractCode::RuntimeCode(RuntimeCodeStruct::ConcreteRuntimeCode(code)) => {
        write!(f, "RuntimeCode(0x{})", hex::encode(code))
      }
      ContractCode::RuntimeCode(RuntimeCodeStruct::SymbolicRuntimeCode(ops)) => {
        write!(f, "SymbolicRuntimeCode")?;
        write_list(f, ops)
      }
    }
  }
}

// Traces -----------------------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Tree<T> {
  pub value: T,
  pub children: Vec<Tree<T>>,
}

impl<T> Tree<T> {
  pub fn leaf(value: T) -> Self {
    Tree { value, children: Vec::new() }
  }

  pub fn node(value: T, children: Vec<Tree<T>>) -> Self {
    Tree { value, children }
  }
}

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum TraceData {
  EventTrace(Expr, Expr, Vec<Expr>),
  FrameTrace(FrameContext),
  ErrorTrace(EvmError),
  EntryTrace(String),
  ReturnTrace(Expr, FrameContext),
}

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Trace {
  pub op_ix: i32,
  pub contract: Contract,
  pub tracedata: TraceData,
}

/// Call-frame forest of one execution path together with the contracts it touched.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct Traces {
  pub traces: Vec<Tree<Trace>>,
  pub contracts: BTreeMap<Expr, Contract>,
}

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum FrameContext {
  CreationContext {
    address: Expr,
    codehash: Expr,
    create_reversion: BTreeMap<Expr, Contract>,
    substate: SubState,
  },
  CallContext {
    target: Expr,
    context: Expr,
    offset: W256,
    size: W256,
    codehash: Expr,
    abi: Option<W256>,
    calldata: Expr,
    call_reversion: BTreeMap<Expr, Contract>,
    substate: SubState,
  },
}

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct SubState {
  pub selfdestructs: Vec<Expr>,
  pub touched_accounts: Vec<Expr>,
  pub accessed_addresses: BTreeSet<Expr>,
  pub accessed_storage_keys: BTreeSet<(Expr, W256)>,
  pub refunds: Vec<(Expr, Word64)>,
}
