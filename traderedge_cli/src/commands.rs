use std::fmt;
use std::path::PathBuf;
use traderedge_core::payment::{CryptoCurrency, PaymentEvent};
use traderedge_core::session::{StaffRole, UserType};
use traderedge_core::store::Plan;

/// A parsed command-line command.
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    Register {
        first_name: String,
        last_name: String,
        email: String,
        plan: Option<Plan>,
    },
    Login {
        email: String,
    },
    AdminLogin {
        role: StaffRole,
        pin: String,
    },
    Logout(UserType),
    Status,
    Refresh,
    Pay(PaymentEvent),
    Receipt(String),
    History,
    Export,
    Import(PathBuf),
    Watch,
}

impl Command {
    /// Whether the command sends an account password.
    pub fn needs_password(&self) -> bool {
        matches!(self, Command::Register { .. } | Command::Login { .. })
    }
}

/// Errors that can occur during command parsing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParseError {
    /// No command given.
    Empty,
    /// Required argument missing; carries the usage line.
    MissingArgument(&'static str),
    /// Unknown staff role.
    InvalidRole(String),
    /// Unknown logout target.
    InvalidUserType(String),
    /// Unknown subscription plan.
    InvalidPlan(String),
    /// Unknown cryptocurrency.
    InvalidCurrency(String),
    /// Amount is not a positive number.
    InvalidAmount(String),
    /// Unknown payment method.
    InvalidPaymentMethod(String),
    /// Unrecognized command.
    UnrecognizedCommand(String),
}

impl fmt::Display for ParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Empty => write!(f, "No command given. Use '--help' to see available commands"),
            Self::MissingArgument(usage) => write!(f, "Missing argument. Usage: {}", usage),
            Self::InvalidRole(value) => write!(
                f,
                "Invalid role '{}'. Use 'admin' or 'customer-service'",
                value
            ),
            Self::InvalidUserType(value) => write!(
                f,
                "Invalid session kind '{}'. Use 'user', 'admin' or 'customer-service'",
                value
            ),
            Self::InvalidPlan(value) => write!(
                f,
                "Invalid plan '{}'. Use kickstarter, basic, pro or enterprise",
                value
            ),
            Self::InvalidCurrency(value) => {
                write!(f, "Invalid currency '{}'. Use ETH, SOL or BTC", value)
            }
            Self::InvalidAmount(value) => write!(
                f,
                "Invalid amount '{}'. Must be a positive number (e.g., '0.05')",
                value
            ),
            Self::InvalidPaymentMethod(value) => write!(
                f,
                "Invalid payment method '{}'. Use 'card', 'alt' or 'crypto'",
                value
            ),
            Self::UnrecognizedCommand(cmd) => write!(
                f,
                "Unrecognized command '{}'. Use '--help' to see available commands",
                cmd
            ),
        }
    }
}

impl std::error::Error for ParseError {}

const REGISTER_USAGE: &str = "register FIRST LAST EMAIL [PLAN]";
const LOGIN_USAGE: &str = "login EMAIL";
const ADMIN_LOGIN_USAGE: &str = "admin-login admin|customer-service PIN";
const PAY_USAGE: &str = "pay card INTENT PLAN | pay alt ORDER PLAN | pay crypto TX ETH|SOL|BTC AMOUNT PLAN";
const RECEIPT_USAGE: &str = "receipt PAYMENT_ID";
const IMPORT_USAGE: &str = "import FILE";

/// Parse command-line words into a [`Command`].
///
/// # Arguments
///
/// * `words` - Free arguments left after option parsing
///
/// # Returns
///
/// * `Ok(Command)` - Successfully parsed command
/// * `Err(ParseError)` - Parse error with descriptive message
///
/// # Examples
///
/// ```
/// use traderedge_cli::commands::{Command, parse_command};
/// use traderedge_core::session::UserType;
///
/// assert_eq!(parse_command(&["status"]), Ok(Command::Status));
/// assert_eq!(parse_command(&["logout"]), Ok(Command::Logout(UserType::User)));
/// assert_eq!(parse_command(&["logout", "admin"]), Ok(Command::Logout(UserType::Admin)));
/// ```
pub fn parse_command<S: AsRef<str>>(words: &[S]) -> Result<Command, ParseError> {
    let parts: Vec<&str> = words.iter().map(|w| w.as_ref().trim()).collect();

    match parts.first() {
        None => Err(ParseError::Empty),
        Some(&"register") => parse_register_command(&parts),
        Some(&"login") => Ok(Command::Login {
            email: required(&parts, 1, LOGIN_USAGE)?.to_string(),
        }),
        Some(&"admin-login") => parse_admin_login_command(&parts),
        Some(&"logout") => parse_logout_command(&parts),
        Some(&"status") => Ok(Command::Status),
        Some(&"refresh") => Ok(Command::Refresh),
        Some(&"pay") => parse_pay_command(&parts),
        Some(&"receipt") => Ok(Command::Receipt(
            required(&parts, 1, RECEIPT_USAGE)?.to_string(),
        )),
        Some(&"history") => Ok(Command::History),
        Some(&"export") => Ok(Command::Export),
        Some(&"import") => Ok(Command::Import(PathBuf::from(required(
            &parts,
            1,
            IMPORT_USAGE,
        )?))),
        Some(&"watch") => Ok(Command::Watch),
        Some(other) => Err(ParseError::UnrecognizedCommand(other.to_string())),
    }
}

fn required<'a>(parts: &[&'a str], index: usize, usage: &'static str) -> Result<&'a str, ParseError> {
    parts
        .get(index)
        .copied()
        .filter(|part| !part.is_empty())
        .ok_or(ParseError::MissingArgument(usage))
}

fn parse_plan(value: &str) -> Result<Plan, ParseError> {
    value
        .parse()
        .map_err(|_| ParseError::InvalidPlan(value.to_string()))
}

/// Parse "register FIRST LAST EMAIL [PLAN]"
fn parse_register_command(parts: &[&str]) -> Result<Command, ParseError> {
    Ok(Command::Register {
        first_name: required(parts, 1, REGISTER_USAGE)?.to_string(),
        last_name: required(parts, 2, REGISTER_USAGE)?.to_string(),
        email: required(parts, 3, REGISTER_USAGE)?.to_string(),
        plan: parts.get(4).map(|plan| parse_plan(plan)).transpose()?,
    })
}

/// Parse "admin-login ROLE PIN"
fn parse_admin_login_command(parts: &[&str]) -> Result<Command, ParseError> {
    let role = required(parts, 1, ADMIN_LOGIN_USAGE)?;
    let pin = required(parts, 2, ADMIN_LOGIN_USAGE)?;
    Ok(Command::AdminLogin {
        role: role
            .parse()
            .map_err(|_| ParseError::InvalidRole(role.to_string()))?,
        pin: pin.to_string(),
    })
}

/// Parse "logout [KIND]"; defaults to the user session
fn parse_logout_command(parts: &[&str]) -> Result<Command, ParseError> {
    match parts.get(1) {
        None => Ok(Command::Logout(UserType::User)),
        Some(kind) => kind
            .parse()
            .map(Command::Logout)
            .map_err(|_| ParseError::InvalidUserType(kind.to_string())),
    }
}

/// Parse "pay METHOD ..."
fn parse_pay_command(parts: &[&str]) -> Result<Command, ParseError> {
    let event = match required(parts, 1, PAY_USAGE)? {
        "card" => PaymentEvent::Card {
            payment_intent_id: required(parts, 2, PAY_USAGE)?.to_string(),
            plan: parse_plan(required(parts, 3, PAY_USAGE)?)?,
        },
        "alt" => PaymentEvent::AltProcessor {
            order_id: required(parts, 2, PAY_USAGE)?.to_string(),
            plan: parse_plan(required(parts, 3, PAY_USAGE)?)?,
        },
        "crypto" => {
            let transaction_hash = required(parts, 2, PAY_USAGE)?.to_string();
            let currency = required(parts, 3, PAY_USAGE)?;
            let amount = required(parts, 4, PAY_USAGE)?;
            PaymentEvent::Crypto {
                transaction_hash,
                currency: currency
                    .parse::<CryptoCurrency>()
                    .map_err(|_| ParseError::InvalidCurrency(currency.to_string()))?,
                amount: parse_amount(amount)?,
                plan: parse_plan(required(parts, 5, PAY_USAGE)?)?,
            }
        }
        other => return Err(ParseError::InvalidPaymentMethod(other.to_string())),
    };
    Ok(Command::Pay(event))
}

fn parse_amount(value: &str) -> Result<f64, ParseError> {
    match value.parse::<f64>() {
        Ok(amount) if amount.is_finite() && amount > 0.0 => Ok(amount),
        _ => Err(ParseError::InvalidAmount(value.to_string())),
    }
}
