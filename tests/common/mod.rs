#![allow(dead_code)]

use std::collections::{BTreeMap, BTreeSet};

use rhoexpr::modules::contract::unknown_contract;
use rhoexpr::modules::etypes::EType;
use rhoexpr::modules::types::{
  Addr, Contract, ContractCode, EvmError, Expr, FrameContext, GVar, PartialExec, Prop, RuntimeCodeStruct, SubState,
  Trace, TraceData, Traces, Tree, W256,
};

pub fn init_logger() {
  let _ = env_logger::builder().is_test(true).try_init();
}

pub fn b(e: Expr) -> Box<Expr> {
  Box::new(e)
}

pub fn lit(n: u64) -> Expr {
  Expr::Lit(W256::from(n))
}

pub fn var(name: &str) -> Expr {
  Expr::Var(name.to_string())
}

pub fn sym(name: &str) -> Expr {
  Expr::SymAddr(name.to_string())
}

pub fn addr(n: u64) -> Expr {
  Expr::LitAddr(Addr::from(n))
}

pub fn abuf(name: &str) -> Expr {
  Expr::AbstractBuf(name.to_string())
}

pub fn cbuf(bytes: &[u8]) -> Expr {
  Expr::ConcreteBuf(bytes.to_vec())
}

/// `Not(Not(...Not(Lit 1)))`, `n` levels of `Not` around the literal.
pub fn not_chain(n: usize) -> Expr {
  (0..n).fold(lit(1), |e, _| Expr::Not(b(e)))
}

/// A terminal state with no embedded expressions.
pub fn end() -> Expr {
  Expr::Failure(vec![], Traces::default(), EvmError::StackUnderrun)
}

pub fn sample_contract(at: Expr) -> Contract {
  Contract {
    code: ContractCode::RuntimeCode(RuntimeCodeStruct::SymbolicRuntimeCode(vec![
      Expr::LitByte(0x60),
      Expr::ReadByte(b(lit(0)), b(abuf("code"))),
    ])),
    storage: Expr::SStore(b(at.clone()), b(lit(1)), b(var("stored")), b(Expr::AbstractStore(b(at.clone()), None))),
    orig_storage: Expr::AbstractStore(b(at), None),
    balance: var("balance"),
    nonce: Some(1),
    external: false,
  }
}

pub fn sample_substate() -> SubState {
  SubState {
    selfdestructs: vec![sym("destroyed")],
    touched_accounts: vec![sym("touched")],
    accessed_addresses: BTreeSet::from([sym("accessed")]),
    accessed_storage_keys: BTreeSet::from([(sym("keyed"), W256::from(3u64))]),
    refunds: vec![(sym("refunded"), 100)],
  }
}

pub fn call_frame(reversion: BTreeMap<Expr, Contract>) -> FrameContext {
  FrameContext::CallContext {
    target: addr(5),
    context: addr(5),
    offset: W256::ZERO,
    size: W256::from(4u64),
    codehash: var("codehash"),
    abi: Some(W256::from(0xa9059cbbu64)),
    calldata: abuf("calldata"),
    call_reversion: reversion,
    substate: sample_substate(),
  }
}

pub fn trace(data: TraceData) -> Trace {
  Trace { op_ix: 0, contract: unknown_contract(sym("traced")), tracedata: data }
}

/// One call frame with every kind of event below it, plus one touched contract.
pub fn sample_traces() -> Traces {
  let creation = FrameContext::CreationContext {
    address: sym("created"),
    codehash: var("created_hash"),
    create_reversion: BTreeMap::new(),
    substate: SubState::default(),
  };
  let root = Tree::node(
    trace(TraceData::FrameTrace(call_frame(BTreeMap::from([(addr(5), sample_contract(addr(5)))])))),
    vec![
      Tree::leaf(trace(TraceData::EventTrace(lit(5), cbuf(&[1, 2]), vec![var("topic")]))),
      Tree::node(
        trace(TraceData::ReturnTrace(abuf("returned"), creation)),
        vec![Tree::leaf(trace(TraceData::ErrorTrace(EvmError::Revert(b(abuf("reason"))))))],
      ),
      Tree::leaf(trace(TraceData::EntryTrace("enter".to_string()))),
    ],
  );
  Traces { traces: vec![root], contracts: BTreeMap::from([(sym("c"), unknown_contract(sym("c")))]) }
}

pub fn log() -> Expr {
  Expr::LogEntry(b(lit(5)), b(abuf("log")), vec![lit(1), var("topic")])
}

/// One instance of every expression constructor, each well kinded.
pub fn every_node() -> Vec<Expr> {
  vec![
    lit(1),
    var("x"),
    Expr::GVar(GVar::new(EType::Word, 0)),
    Expr::LitByte(7),
    Expr::IndexWord(b(lit(0)), b(var("x"))),
    Expr::EqByte(b(Expr::LitByte(1)), b(Expr::LitByte(2))),
    Expr::JoinBytes(Box::new(std::array::from_fn(|i| Expr::LitByte(i as u8)))),
    Expr::Partial(
      vec![Prop::PEq(var("x"), lit(1))],
      sample_traces(),
      PartialExec::UnexpectedSymbolicArg { pc: 3, msg: "symbolic jump".to_string(), args: vec![var("y")] },
    ),
    Expr::Failure(vec![Prop::PLT(var("x"), lit(10))], Traces::default(), EvmError::Revert(b(abuf("out")))),
    Expr::Success(
      vec![Prop::PBool(true)],
      Traces::default(),
      b(cbuf(&[1])),
      BTreeMap::from([(addr(5), sample_contract(addr(5)).to_expr())]),
    ),
    Expr::ITE(b(var("c")), b(end()), b(Expr::Partial(vec![], Traces::default(), PartialExec::MaxIterationsReached {
      pc: 1,
      addr: b(sym("looping")),
    }))),
    Expr::Add(b(var("a")), b(lit(2))),
    Expr::Sub(b(var("a")), b(lit(2))),
    Expr::Mul(b(var("a")), b(lit(2))),
    Expr::Div(b(var("a")), b(lit(2))),
    Expr::SDiv(b(var("a")), b(lit(2))),
    Expr::Mod(b(var("a")), b(lit(2))),
    Expr::SMod(b(var("a")), b(lit(2))),
    Expr::AddMod(b(lit(1)), b(lit(2)), b(var("n"))),
    Expr::MulMod(b(lit(1)), b(lit(2)), b(var("n"))),
    Expr::Exp(b(var("a")), b(lit(2))),
    Expr::SEx(b(lit(0)), b(var("a"))),
    Expr::Min(b(var("a")), b(lit(2))),
    Expr::Max(b(var("a")), b(lit(2))),
    Expr::LT(b(var("a")), b(lit(2))),
    Expr::GT(b(var("a")), b(lit(2))),
    Expr::LEq(b(var("a")), b(lit(2))),
    Expr::GEq(b(var("a")), b(lit(2))),
    Expr::SLT(b(var("a")), b(lit(2))),
    Expr::SGT(b(var("a")), b(lit(2))),
    Expr::Eq(b(var("a")), b(lit(2))),
    Expr::IsZero(b(var("a"))),
    Expr::And(b(var("a")), b(lit(2))),
    Expr::Or(b(var("a")), b(lit(2))),
    Expr::Xor(b(var("a")), b(lit(2))),
    Expr::Not(b(var("a"))),
    Expr::SHL(b(lit(1)), b(var("a"))),
    Expr::SHR(b(lit(1)), b(var("a"))),
    Expr::SAR(b(lit(1)), b(var("a"))),
    Expr::Keccak(b(abuf("k"))),
    Expr::SHA256(b(cbuf(&[1, 2]))),
    Expr::Origin,
    Expr::BlockHash(b(lit(1))),
    Expr::Coinbase,
    Expr::Timestamp,
    Expr::BlockNumber,
    Expr::PrevRandao,
    Expr::GasLimit,
    Expr::ChainId,
    Expr::BaseFee,
    Expr::TxValue,
    Expr::Balance("frame-0".to_string()),
    Expr::Gas(0, 12),
    Expr::CodeSize(b(sym("c"))),
    Expr::CodeHash(b(addr(5))),
    log(),
    Expr::C {
      code: ContractCode::UnKnownCode(b(sym("u"))),
      storage: b(Expr::ConcreteStore(BTreeMap::new())),
      balance: b(lit(0)),
      nonce: Some(1),
    },
    sym("s"),
    addr(5),
    Expr::WAddr(b(Expr::Add(b(var("x")), b(lit(1))))),
    Expr::ConcreteStore(BTreeMap::from([(W256::from(1u64), W256::from(2u64))])),
    Expr::AbstractStore(b(sym("s")), Some(W256::from(1u64))),
    Expr::SLoad(b(sym("s")), b(lit(1)), b(Expr::AbstractStore(b(sym("s")), None))),
    Expr::SStore(b(sym("s")), b(lit(1)), b(var("v")), b(Expr::ConcreteStore(BTreeMap::new()))),
    cbuf(&[0xde, 0xad]),
    abuf("m"),
    Expr::ReadWord(b(lit(0)), b(abuf("m"))),
    Expr::ReadByte(b(lit(0)), b(abuf("m"))),
    Expr::WriteWord(b(lit(0)), b(var("v")), b(abuf("m"))),
    Expr::WriteByte(b(lit(0)), b(Expr::LitByte(1)), b(cbuf(&[]))),
    Expr::CopySlice(b(lit(0)), b(lit(32)), b(lit(4)), b(abuf("src")), b(cbuf(&[]))),
    Expr::BufLength(b(abuf("m"))),
    Expr::Create {
      value: b(lit(0)),
      offset: b(lit(0)),
      size: b(lit(4)),
      memory: b(abuf("mem")),
      logs: vec![log()],
      storage: b(Expr::AbstractStore(b(sym("s")), None)),
      cont: b(end()),
    },
    Expr::Create2 {
      value: b(lit(0)),
      offset: b(lit(0)),
      size: b(lit(4)),
      salt: b(var("salt")),
      memory: b(abuf("mem")),
      logs: vec![],
      storage: b(Expr::ConcreteStore(BTreeMap::new())),
      cont: b(end()),
    },
    Expr::Call {
      gas: b(var("gas")),
      target: Some(b(sym("callee"))),
      value: b(lit(0)),
      args: b(abuf("args")),
      ret_offset: b(lit(0)),
      ret_size: b(lit(32)),
      logs: vec![log()],
      cont: b(end()),
    },
    Expr::CallCode {
      gas: b(var("gas")),
      target: None,
      value: b(lit(0)),
      args: b(abuf("args")),
      ret_offset: b(lit(0)),
      ret_size: b(lit(32)),
      logs: vec![],
      cont: b(end()),
    },
    Expr::DelegateCall {
      gas: b(var("gas")),
      target: Some(b(addr(9))),
      args: b(abuf("args")),
      ret_offset: b(lit(0)),
      ret_size: b(lit(32)),
      logs: vec![log(), log()],
      cont: b(end()),
    },
    Expr::StaticCall {
      gas: b(var("gas")),
      target: None,
      args: b(cbuf(&[])),
      ret_offset: b(lit(0)),
      ret_size: b(lit(0)),
      logs: vec![],
      cont: b(end()),
    },
  ]
}

/// Pre-order constructor names of every expression in `t`.
pub fn tags<T: rhoexpr::modules::traversals::TraversableTerm>(t: &T) -> Vec<&'static str> {
  t.fold_term(&mut |e: &Expr| vec![e.tag()], Vec::new())
}
