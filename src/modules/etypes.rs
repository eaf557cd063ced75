use std::fmt;

/// The value kind every expression node carries.
///
/// `Expr` is a single enum, so the kind is a runtime witness computed by
/// `Expr::kind` rather than a type parameter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum EType {
  Word,
  Byte,
  Addr,
  Buf,
  Storage,
  Contract,
  End,
  Log,
}

impl EType {
  pub fn type_name(&self) -> &'static str {
    match self {
      EType::Word => "EWord",
      EType::Byte => "Byte",
      EType::Addr => "EAddr",
      EType::Buf => "Buf",
      EType::Storage => "Storage",
      EType::Contract => "EContract",
      EType::End => "End",
      EType::Log => "Log",
    }
  }
}

impl fmt::Display for EType {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(self.type_name())
  }
}
