use ethers::abi::token::{LenientTokenizer, Tokenizer};
use ethers::abi::{Abi, Function, Token};
use ethers::types::{Address, I256, U256};
use eyre::{Context, ContextCompat};
use serde_json::{Map, Value};

use super::UnsignedTransaction;

#[derive(Debug, Clone)]
enum CallArgs {
    Tokens(Vec<Token>),
    Raw(Vec<String>),
}

/// A call encoded against an ABI, with the metadata a reviewer needs.
#[derive(Debug, Clone)]
pub struct PopulatedCall {
    pub tx: UnsignedTransaction,
    pub abi: Value,
    pub function_signature: String,
    pub human_readable_args: Map<String, Value>,
}

#[derive(Default, Clone, Debug)]
pub struct CallBuilder {
    abi: Option<Abi>,
    function_name: Option<String>,
    args: Option<CallArgs>,
    to: Option<Address>,
    value: U256,
}

impl CallBuilder {
    pub fn abi(mut self, abi: Abi) -> Self {
        self.abi = Some(abi);
        self
    }

    pub fn function_name(mut self, function_name: impl ToString) -> Self {
        self.function_name = Some(function_name.to_string());
        self
    }

    pub fn args(mut self, args: Vec<Token>) -> Self {
        self.args = Some(CallArgs::Tokens(args));
        self
    }

    /// Arguments as text, tokenized against the function's parameter types.
    pub fn raw_args(mut self, args: Vec<String>) -> Self {
        self.args = Some(CallArgs::Raw(args));
        self
    }

    pub fn to(mut self, to: Address) -> Self {
        self.to = Some(to);
        self
    }

    pub fn value(mut self, value: U256) -> Self {
        self.value = value;
        self
    }

    pub fn build(self) -> eyre::Result<PopulatedCall> {
        let abi = self.abi.context("CallBuilder missing abi")?;
        let function_name = self
            .function_name
            .context("CallBuilder missing function_name")?;
        let args = self.args.unwrap_or(CallArgs::Tokens(vec![]));
        let to = self.to.context("CallBuilder missing to")?;

        let arg_count = match &args {
            CallArgs::Tokens(tokens) => tokens.len(),
            CallArgs::Raw(raw) => raw.len(),
        };

        let function = abi
            .functions_by_name(&function_name)?
            .iter()
            .find(|function| function.inputs.len() == arg_count)
            .with_context(|| {
                format!(
                    "No overload of {function_name} takes {arg_count} arguments"
                )
            })?;

        let tokens = match args {
            CallArgs::Tokens(tokens) => tokens,
            CallArgs::Raw(raw) => tokenize_args(function, &raw)?,
        };

        let data = function
            .encode_input(&tokens)
            .with_context(|| format!("Encoding {function_name}"))?;

        Ok(PopulatedCall {
            tx: UnsignedTransaction::new(to, data).with_value(self.value),
            abi: serde_json::to_value(&abi)?,
            function_signature: function_signature(function),
            human_readable_args: named_args(function, &tokens),
        })
    }
}

pub fn function_signature(function: &Function) -> String {
    let params: Vec<_> = function
        .inputs
        .iter()
        .map(|param| param.kind.to_string())
        .collect();

    format!("{}({})", function.name, params.join(","))
}

fn tokenize_args(
    function: &Function,
    raw: &[String],
) -> eyre::Result<Vec<Token>> {
    function
        .inputs
        .iter()
        .zip(raw)
        .map(|(param, value)| {
            LenientTokenizer::tokenize(&param.kind, value).with_context(|| {
                format!(
                    "Argument {} of {} is not a valid {}: {value}",
                    param.name, function.name, param.kind
                )
            })
        })
        .collect()
}

fn named_args(function: &Function, tokens: &[Token]) -> Map<String, Value> {
    function
        .inputs
        .iter()
        .zip(tokens)
        .enumerate()
        .map(|(idx, (param, token))| {
            let name = if param.name.is_empty() {
                format!("arg{idx}")
            } else {
                param.name.clone()
            };

            (name, token_to_json(token))
        })
        .collect()
}

pub fn token_to_json(token: &Token) -> Value {
    match token {
        Token::Address(address) => Value::String(format!("{address:?}")),
        Token::FixedBytes(bytes) | Token::Bytes(bytes) => {
            Value::String(format!("0x{}", hex::encode(bytes)))
        }
        Token::Int(int) => Value::String(I256::from_raw(*int).to_string()),
        Token::Uint(uint) => Value::String(uint.to_string()),
        Token::Bool(flag) => Value::Bool(*flag),
        Token::String(s) => Value::String(s.clone()),
        Token::FixedArray(tokens)
        | Token::Array(tokens)
        | Token::Tuple(tokens) => {
            Value::Array(tokens.iter().map(token_to_json).collect())
        }
    }
}
