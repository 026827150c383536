//! The surface the host invokes: named functions with string arguments.

use dl_ledger::KeyValueLedger;
use dl_record::{Record, RecordCodec};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::error::{ContractError, ContractResult};
use crate::service::RecordService;

/// Status code of a successful invocation.
pub const OK: u16 = 200;
/// Status code of a failed invocation.
pub const ERROR: u16 = 500;

/// A parsed call to one of the contract's exported functions.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Invocation {
    InitLedger,
    CreateData(Record),
    ReadData { id: String },
    UpdateData(Record),
    DeleteData { id: String },
    DataExists { id: String },
    GetAllDatas,
}

impl Invocation {
    /// Every function name the contract exports.
    pub const FUNCTIONS: [&'static str; 7] = [
        "InitLedger",
        "CreateData",
        "ReadData",
        "UpdateData",
        "DeleteData",
        "DataExists",
        "GetAllDatas",
    ];

    /// Interpret a function name and its arguments per the host calling
    /// convention.
    ///
    /// Record-carrying functions take `id, taskId, companyCode, letterNumber,
    /// predictedValue, predictedDeviation, fValue`, with the two codes given
    /// as decimal integers.
    pub fn parse<S: AsRef<str>>(function: &str, args: &[S]) -> ContractResult<Self> {
        match function {
            "InitLedger" => {
                expect_arity(function, args, 0)?;
                Ok(Self::InitLedger)
            }
            "CreateData" => Ok(Self::CreateData(record_from_args(function, args)?)),
            "ReadData" => Ok(Self::ReadData {
                id: single_id(function, args)?,
            }),
            "UpdateData" => Ok(Self::UpdateData(record_from_args(function, args)?)),
            "DeleteData" => Ok(Self::DeleteData {
                id: single_id(function, args)?,
            }),
            "DataExists" => Ok(Self::DataExists {
                id: single_id(function, args)?,
            }),
            "GetAllDatas" => {
                expect_arity(function, args, 0)?;
                Ok(Self::GetAllDatas)
            }
            other => Err(ContractError::UnknownFunction(other.to_string())),
        }
    }

    pub fn function_name(&self) -> &'static str {
        match self {
            Self::InitLedger => "InitLedger",
            Self::CreateData(_) => "CreateData",
            Self::ReadData { .. } => "ReadData",
            Self::UpdateData(_) => "UpdateData",
            Self::DeleteData { .. } => "DeleteData",
            Self::DataExists { .. } => "DataExists",
            Self::GetAllDatas => "GetAllDatas",
        }
    }

    /// Whether the invocation leaves world state untouched.
    pub fn is_read_only(&self) -> bool {
        matches!(
            self,
            Self::ReadData { .. } | Self::DataExists { .. } | Self::GetAllDatas
        )
    }
}

/// Outcome of an invocation as returned to the host.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Response {
    pub status: u16,
    pub message: String,
    /// JSON result; empty for functions that return nothing.
    pub payload: Vec<u8>,
}

impl Response {
    pub fn success(payload: Vec<u8>) -> Self {
        Self {
            status: OK,
            message: String::new(),
            payload,
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            status: ERROR,
            message: message.into(),
            payload: Vec::new(),
        }
    }

    pub fn is_ok(&self) -> bool {
        self.status == OK
    }
}

impl RecordService {
    /// Run a parsed invocation and return its JSON payload.
    pub fn invoke(
        &self,
        ledger: &dyn KeyValueLedger,
        invocation: &Invocation,
    ) -> ContractResult<Vec<u8>> {
        debug!(function = invocation.function_name(), "invoking");
        match invocation {
            Invocation::InitLedger => {
                self.init_ledger(ledger)?;
                Ok(Vec::new())
            }
            Invocation::CreateData(record) => {
                self.create(ledger, record)?;
                Ok(Vec::new())
            }
            Invocation::ReadData { id } => {
                let record = self.read(ledger, id)?;
                RecordCodec::encode(&record).map_err(ContractError::Encode)
            }
            Invocation::UpdateData(record) => {
                self.update(ledger, record)?;
                Ok(Vec::new())
            }
            Invocation::DeleteData { id } => {
                self.delete(ledger, id)?;
                Ok(Vec::new())
            }
            Invocation::DataExists { id } => {
                let exists = self.exists(ledger, id)?;
                Ok(exists.to_string().into_bytes())
            }
            Invocation::GetAllDatas => {
                let records = self.list_all(ledger)?;
                RecordCodec::encode_list(&records).map_err(ContractError::Encode)
            }
        }
    }

    /// Parse and run `function`, folding any failure into an error response.
    pub fn dispatch<S: AsRef<str>>(
        &self,
        ledger: &dyn KeyValueLedger,
        function: &str,
        args: &[S],
    ) -> Response {
        let result = Invocation::parse(function, args)
            .and_then(|invocation| self.invoke(ledger, &invocation));
        match result {
            Ok(payload) => Response::success(payload),
            Err(e) => {
                if e.is_user_error() {
                    debug!(function, error = %e, "invocation rejected");
                } else {
                    warn!(function, error = %e, "invocation failed");
                }
                Response::error(e.to_string())
            }
        }
    }
}

fn expect_arity<S>(function: &str, args: &[S], expected: usize) -> ContractResult<()> {
    if args.len() != expected {
        return Err(ContractError::WrongArity {
            function: function.to_string(),
            expected,
            actual: args.len(),
        });
    }
    Ok(())
}

fn single_id<S: AsRef<str>>(function: &str, args: &[S]) -> ContractResult<String> {
    expect_arity(function, args, 1)?;
    Ok(args[0].as_ref().to_string())
}

fn parse_int(name: &str, value: &str) -> ContractResult<i64> {
    value.parse().map_err(|e| ContractError::InvalidArgument {
        name: name.to_string(),
        reason: format!("{value:?} is not an integer: {e}"),
    })
}

fn record_from_args<S: AsRef<str>>(function: &str, args: &[S]) -> ContractResult<Record> {
    expect_arity(function, args, 7)?;
    let arg = |i: usize| args[i].as_ref();
    Ok(Record {
        id: arg(0).to_string(),
        task_id: parse_int("taskId", arg(1))?,
        company_code: parse_int("companyCode", arg(2))?,
        letter_number: arg(3).to_string(),
        predicted_value: arg(4).to_string(),
        predicted_deviation: arg(5).to_string(),
        f_value: arg(6).to_string(),
    })
}
