//! The typed reply shape a gateway renders into wire bytes (RESP2's
//! Integer/Bulk/Simple String/Array/Nil, mapped one-to-one).

#[derive(Debug, Clone, PartialEq)]
pub enum CommandReply {
    Ok,
    Nil,
    Integer(i64),
    Bulk(Vec<u8>),
    SimpleString(String),
    Array(Vec<CommandReply>),
}

impl CommandReply {
    pub(crate) fn bulk(bytes: Vec<u8>) -> Self {
        Self::Bulk(bytes)
    }

    pub(crate) fn bulk_opt(bytes: Option<Vec<u8>>) -> Self {
        bytes.map_or(Self::Nil, Self::Bulk)
    }

    pub(crate) fn bool_integer(b: bool) -> Self {
        Self::Integer(i64::from(b))
    }

    pub(crate) fn float(f: f64) -> Self {
        Self::Bulk(f.to_string().into_bytes())
    }

    pub(crate) fn float_opt(f: Option<f64>) -> Self {
        f.map_or(Self::Nil, Self::float)
    }
}
