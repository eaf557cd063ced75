// Module: rhoexpr::contract
// Description: Builders for contracts and frame sub-state, and views of contract code as buffers

use crate::modules::keccak::keccak_w256;
use crate::modules::types::{Contract, ContractCode, Expr, RuntimeCodeStruct, SubState, W256};

pub fn unknown_contract(addr: Expr) -> Contract {
  Contract {
    code: ContractCode::UnKnownCode(Box::new(addr.clone())),
    storage: Expr::AbstractStore(Box::new(addr.clone()), None),
    orig_storage: Expr::AbstractStore(Box::new(addr.clone()), None),
    balance: Expr::Balance(addr.to_string()),
    nonce: None,
    external: false,
  }
}

/// Contract with known code but unconstrained storage and balance.
pub fn abstract_contract(code: ContractCode, addr: Expr) -> Contract {
  let nonce = if is_creation(&code) { Some(1) } else { Some(0) };
  Contract {
    code,
    storage: Expr::AbstractStore(Box::new(addr.clone()), None),
    orig_storage: Expr::AbstractStore(Box::new(addr.clone()), None),
    balance: Expr::Balance(addr.to_string()),
    nonce,
    external: false,
  }
}

pub fn initial_contract(code: ContractCode) -> Contract {
  let nonce = if is_creation(&code) { Some(1) } else { Some(0) };
  Contract {
    code,
    storage: Expr::ConcreteStore(Default::default()),
    orig_storage: Expr::ConcreteStore(Default::default()),
    balance: Expr::Lit(W256::ZERO),
    nonce,
    external: false,
  }
}

pub fn empty_contract() -> Contract {
  initial_contract(ContractCode::RuntimeCode(RuntimeCodeStruct::ConcreteRuntimeCode(Vec::new())))
}

pub fn blank_substate() -> SubState {
  SubState::default()
}

fn is_creation(code: &ContractCode) -> bool {
  matches!(code, ContractCode::InitCode(..))
}

impl Contract {
  /// The contract as a `C` node, as it appears in the final state of a `Success`.
  pub fn to_expr(&self) -> Expr {
    Expr::C {
      code: self.code.clone(),
      storage: Box::new(self.storage.clone()),
      balance: Box::new(self.balance.clone()),
      nonce: self.nonce,
    }
  }
}

/// Buffer holding the given bytes, concrete when every byte is a literal.
pub fn from_list(bytes: &[Expr]) -> Expr {
  let concrete: Option<Vec<u8>> = bytes
    .iter()
    .map(|b| match b {
      Expr::LitByte(v) => Some(*v),
      _ => None,
    })
    .collect();
  match concrete {
    Some(bs) => Expr::ConcreteBuf(bs),
    None => bytes.iter().enumerate().fold(Expr::ConcreteBuf(Vec::new()), |buf, (i, b)| {
      Expr::WriteByte(Box::new(Expr::Lit(W256::from(i as u64))), Box::new(b.clone()), Box::new(buf))
    }),
  }
}

/// Initcode bytes followed by the constructor arguments.
fn concat_code(ops: &[u8], args: &Expr) -> Expr {
  match args {
    Expr::ConcreteBuf(bs) => Expr::ConcreteBuf([ops, bs.as_slice()].concat()),
    _ => Expr::CopySlice(
      Box::new(Expr::Lit(W256::ZERO)),
      Box::new(Expr::Lit(W256::from(ops.len() as u64))),
      Box::new(Expr::BufLength(Box::new(args.clone()))),
      Box::new(args.clone()),
      Box::new(Expr::ConcreteBuf(ops.to_vec())),
    ),
  }
}

/// The code as a buffer; `None` while it is still unknown.
pub fn to_buf(code: &ContractCode) -> Option<Expr> {
  match code {
    ContractCode::UnKnownCode(_) => None,
    ContractCode::InitCode(ops, args) => Some(concat_code(ops, args)),
    ContractCode::RuntimeCode(RuntimeCodeStruct::ConcreteRuntimeCode(ops)) => Some(Expr::ConcreteBuf(ops.clone())),
    ContractCode::RuntimeCode(RuntimeCodeStruct::SymbolicRuntimeCode(ops)) => Some(from_list(ops)),
  }
}

pub fn hashcode(code: &ContractCode) -> Expr {
  match code {
    ContractCode::UnKnownCode(addr) => Expr::CodeHash(addr.clone()),
    // the hash covers the initcode only, not the constructor arguments
    ContractCode::InitCode(ops, _) => Expr::Lit(keccak_w256(ops)),
    ContractCode::RuntimeCode(RuntimeCodeStruct::ConcreteRuntimeCode(ops)) => Expr::Lit(keccak_w256(ops)),
    ContractCode::RuntimeCode(RuntimeCodeStruct::SymbolicRuntimeCode(ops)) => match from_list(ops) {
      Expr::ConcreteBuf(bs) => Expr::Lit(keccak_w256(&bs)),
      buf => Expr::Keccak(Box::new(buf)),
    },
  }
}

pub fn codelen(code: &ContractCode) -> Expr {
  match code {
    ContractCode::UnKnownCode(addr) => Expr::CodeSize(addr.clone()),
    ContractCode::InitCode(ops, args) => match &**args {
      Expr::ConcreteBuf(bs) => Expr::Lit(W256::from((ops.len() + bs.len()) as u64)),
      _ => Expr::Add(Box::new(Expr::Lit(W256::from(ops.len() as u64))), Box::new(Expr::BufLength(args.clone()))),
    },
    ContractCode::RuntimeCode(RuntimeCodeStruct::ConcreteRuntimeCode(ops)) => Expr::Lit(W256::from(ops.len() as u64)),
    ContractCode::RuntimeCode(RuntimeCodeStruct::SymbolicRuntimeCode(ops)) => Expr::Lit(W256::from(ops.len() as u64)),
  }
}
