use serde_json::Value;
use thiserror::Error;

use crate::models::{OrderType, WebhookAction, WebhookOrder, WebhookRequest};

#[derive(Debug, Clone, Error, PartialEq)]
pub enum WebhookValidationError {
    #[error("Missing required field: account_number or accounts")]
    MissingAccount,
    #[error("Missing required field: action")]
    MissingAction,
    #[error("Invalid action. Must be one of: BUY, SELL, LONG, SHORT, CLOSE, CLOSE_ALL, CLOSE_SYMBOL")]
    InvalidAction(String),
    #[error("Missing required field: {0}")]
    MissingField(&'static str),
    #[error("Invalid {field}: {reason}")]
    InvalidField { field: &'static str, reason: String },
}

/// Check a raw webhook payload and turn it into a `WebhookOrder`.
pub fn validate_webhook(req: WebhookRequest) -> Result<WebhookOrder, WebhookValidationError> {
    let accounts = collect_accounts(&req)?;

    let action_raw = req
        .action
        .as_deref()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .ok_or(WebhookValidationError::MissingAction)?;
    let action = WebhookAction::parse(action_raw)
        .ok_or_else(|| WebhookValidationError::InvalidAction(action_raw.to_string()))?;

    let symbol = req
        .symbol
        .as_deref()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string);

    let order_type = match req.order_type.as_deref().map(str::trim) {
        None | Some("") => OrderType::Market,
        Some(raw) => OrderType::from_str(raw).ok_or_else(|| WebhookValidationError::InvalidField {
            field: "order_type",
            reason: format!("{} (expected market, limit or stop)", raw),
        })?,
    };

    let volume = optional_number("volume", req.volume.as_ref())?;
    let price = optional_number("price", req.price.as_ref())?;
    let take_profit = optional_number("take_profit", req.take_profit.as_ref())?;
    let stop_loss = optional_number("stop_loss", req.stop_loss.as_ref())?;
    let ticket = optional_ticket(req.ticket.as_ref())?;

    if action.opens_position() {
        if symbol.is_none() {
            return Err(WebhookValidationError::MissingField("symbol"));
        }
        match volume {
            None => return Err(WebhookValidationError::MissingField("volume")),
            Some(v) if v <= 0.0 => {
                return Err(WebhookValidationError::InvalidField {
                    field: "volume",
                    reason: "must be greater than 0".to_string(),
                })
            }
            Some(_) => {}
        }
        if order_type.is_pending() && price.is_none() {
            return Err(WebhookValidationError::MissingField("price"));
        }
    }

    match action {
        WebhookAction::Close if ticket.is_none() && symbol.is_none() => {
            return Err(WebhookValidationError::MissingField("ticket or symbol"));
        }
        WebhookAction::CloseSymbol if symbol.is_none() => {
            return Err(WebhookValidationError::MissingField("symbol"));
        }
        _ => {}
    }

    let position_type = match req.position_type.as_deref().map(str::trim) {
        None | Some("") => None,
        Some(raw) => {
            let upper = raw.to_ascii_uppercase();
            if upper != "BUY" && upper != "SELL" {
                return Err(WebhookValidationError::InvalidField {
                    field: "position_type",
                    reason: format!("{} (expected BUY or SELL)", raw),
                });
            }
            Some(upper)
        }
    };

    Ok(WebhookOrder {
        accounts,
        action,
        symbol,
        volume,
        order_type,
        price,
        take_profit,
        stop_loss,
        ticket,
        position_type,
        comment: req.comment,
    })
}

/// Destination accounts, de-duplicated in request order
fn collect_accounts(req: &WebhookRequest) -> Result<Vec<String>, WebhookValidationError> {
    let mut accounts: Vec<String> = Vec::new();

    if let Some(list) = &req.accounts {
        for value in list {
            let account = match value {
                Value::String(s) => s.trim().to_string(),
                Value::Number(n) => n.to_string(),
                other => {
                    return Err(WebhookValidationError::InvalidField {
                        field: "accounts",
                        reason: format!("unexpected entry {}", other),
                    })
                }
            };
            if !account.is_empty() && !accounts.contains(&account) {
                accounts.push(account);
            }
        }
    }

    if accounts.is_empty() {
        if let Some(account) = req.account_number.as_deref().filter(|s| !s.is_empty()) {
            accounts.push(account.to_string());
        }
    }

    if accounts.is_empty() {
        return Err(WebhookValidationError::MissingAccount);
    }
    Ok(accounts)
}

fn optional_number(
    field: &'static str,
    value: Option<&Value>,
) -> Result<Option<f64>, WebhookValidationError> {
    let number = match value {
        None | Some(Value::Null) => return Ok(None),
        Some(Value::Number(n)) => n.as_f64(),
        Some(Value::String(s)) if s.trim().is_empty() => return Ok(None),
        Some(Value::String(s)) => s.trim().parse::<f64>().ok(),
        Some(_) => None,
    };

    match number {
        Some(n) if n.is_finite() => Ok(Some(n)),
        _ => Err(WebhookValidationError::InvalidField {
            field,
            reason: "must be a number".to_string(),
        }),
    }
}

fn optional_ticket(value: Option<&Value>) -> Result<Option<i64>, WebhookValidationError> {
    let invalid = || WebhookValidationError::InvalidField {
        field: "ticket",
        reason: "must be an integer".to_string(),
    };
    match value {
        None | Some(Value::Null) => Ok(None),
        Some(Value::Number(n)) => n.as_i64().map(Some).ok_or_else(invalid),
        Some(Value::String(s)) if s.trim().is_empty() => Ok(None),
        Some(Value::String(s)) => s.trim().parse::<i64>().map(Some).map_err(|_| invalid()),
        Some(_) => Err(invalid()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(json: &str) -> Result<WebhookOrder, WebhookValidationError> {
        let req: WebhookRequest = serde_json::from_str(json).unwrap();
        validate_webhook(req)
    }

    #[test]
    fn test_market_buy() {
        let order = parse(
            r#"{"account_number":"1001","action":"buy","symbol":"XAUUSD","volume":0.1,"tp":2400}"#,
        )
        .unwrap();
        assert_eq!(order.accounts, vec!["1001"]);
        assert_eq!(order.action, WebhookAction::Buy);
        assert_eq!(order.order_type, OrderType::Market);
        assert_eq!(order.volume, Some(0.1));
        assert_eq!(order.take_profit, Some(2400.0));
    }

    #[test]
    fn test_accounts_list_takes_precedence_and_dedupes() {
        let order = parse(
            r#"{"account_number":"9","accounts":[1001,"1002","1001"],"action":"CLOSE_ALL"}"#,
        )
        .unwrap();
        assert_eq!(order.accounts, vec!["1001", "1002"]);
    }

    #[test]
    fn test_missing_account_and_action() {
        assert_eq!(
            parse(r#"{"action":"BUY"}"#),
            Err(WebhookValidationError::MissingAccount)
        );
        assert_eq!(
            parse(r#"{"account_number":"1001"}"#),
            Err(WebhookValidationError::MissingAction)
        );
        assert_eq!(
            parse(r#"{"accounts":[],"action":"BUY"}"#),
            Err(WebhookValidationError::MissingAccount)
        );
    }

    #[test]
    fn test_unknown_action_lists_supported_ones() {
        let err = parse(r#"{"account_number":"1001","action":"HOLD"}"#).unwrap_err();
        assert_eq!(
            err.to_string(),
            "Invalid action. Must be one of: BUY, SELL, LONG, SHORT, CLOSE, CLOSE_ALL, CLOSE_SYMBOL"
        );
    }

    #[test]
    fn test_open_needs_symbol_and_positive_volume() {
        assert_eq!(
            parse(r#"{"account_number":"1","action":"SELL","volume":1}"#),
            Err(WebhookValidationError::MissingField("symbol"))
        );
        assert_eq!(
            parse(r#"{"account_number":"1","action":"SELL","symbol":"EURUSD"}"#),
            Err(WebhookValidationError::MissingField("volume"))
        );
        assert!(parse(r#"{"account_number":"1","action":"SELL","symbol":"EURUSD","volume":0}"#)
            .is_err());
        assert!(
            parse(r#"{"account_number":"1","action":"SELL","symbol":"EURUSD","volume":"abc"}"#)
                .is_err()
        );
        assert!(
            parse(r#"{"account_number":"1","action":"SHORT","symbol":"EURUSD","volume":"0.2"}"#)
                .is_ok()
        );
    }

    #[test]
    fn test_pending_orders_need_price() {
        assert_eq!(
            parse(
                r#"{"account_number":"1","action":"BUY","symbol":"EURUSD","volume":1,"order_type":"limit"}"#
            ),
            Err(WebhookValidationError::MissingField("price"))
        );
        let order = parse(
            r#"{"account_number":"1","action":"BUY","symbol":"EURUSD","volume":1,"order_type":"STOP","price":"1.1"}"#,
        )
        .unwrap();
        assert_eq!(order.order_type, OrderType::Stop);
        assert_eq!(order.price, Some(1.1));

        assert!(parse(
            r#"{"account_number":"1","action":"BUY","symbol":"EURUSD","volume":1,"order_type":"iceberg"}"#
        )
        .is_err());
    }

    #[test]
    fn test_close_rules() {
        assert_eq!(
            parse(r#"{"account_number":"1","action":"CLOSE"}"#),
            Err(WebhookValidationError::MissingField("ticket or symbol"))
        );
        let order = parse(r#"{"account_number":"1","action":"CLOSE","ticket":"123"}"#).unwrap();
        assert_eq!(order.ticket, Some(123));
        assert!(parse(r#"{"account_number":"1","action":"CLOSE","ticket":1.5}"#).is_err());

        assert_eq!(
            parse(r#"{"account_number":"1","action":"CLOSE_SYMBOL"}"#),
            Err(WebhookValidationError::MissingField("symbol"))
        );
        assert!(parse(r#"{"account_number":"1","action":"CLOSE_ALL"}"#).is_ok());
    }

    #[test]
    fn test_position_type() {
        let order = parse(
            r#"{"account_number":"1","action":"CLOSE_SYMBOL","symbol":"XAUUSD","position_type":"sell"}"#,
        )
        .unwrap();
        assert_eq!(order.position_type.as_deref(), Some("SELL"));

        assert!(parse(
            r#"{"account_number":"1","action":"CLOSE_SYMBOL","symbol":"XAUUSD","position_type":"both"}"#
        )
        .is_err());
    }
}
