//! Classify completion payloads as error or success and decode their payloads.

use std::collections::HashMap;

use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::command::RequestId;
use crate::error::{InboundJsonError, PurchasesError, ResponseDecodeError, SdkError};
use crate::model::{
    IntroEligibility, Offerings, Product, PurchaseFailure, PurchaseResult, PurchaserInfo,
};

const ERROR_KEY: &str = "error";
const REQUEST_ID_KEY: &str = "requestId";
const USER_CANCELLED_KEY: &str = "userCancelled";

/// Parse the raw string delivered by the native layer.
pub fn parse_inbound(payload: &str) -> Result<Value, SdkError> {
    serde_json::from_str(payload).map_err(|err| InboundJsonError::new(payload, err).into())
}

/// True when `raw` carries a non-null `error` value.
pub fn response_has_error(raw: &Value) -> bool {
    raw.get(ERROR_KEY).is_some_and(|error| !error.is_null())
}

/// Request id echoed by the native layer, if any.
pub fn request_id(raw: &Value) -> Option<RequestId> {
    raw.get(REQUEST_ID_KEY)
        .and_then(Value::as_u64)
        .map(RequestId::new)
}

/// Build the error entity from the `error` subtree.
pub fn decode_error(raw: &Value) -> SdkError {
    let Some(error) = raw.get(ERROR_KEY) else {
        return ResponseDecodeError::new("response has no 'error' object", Some(raw.clone()))
            .into();
    };

    match serde_json::from_value::<PurchasesError>(error.clone()) {
        Ok(decoded) => decoded.into(),
        Err(err) => ResponseDecodeError::new(
            format!("invalid 'error' object: {err}"),
            Some(error.clone()),
        )
        .into(),
    }
}

/// Decode the subtree stored under `key`, or the error the response carries.
pub fn decode_payload<T: DeserializeOwned>(raw: &Value, key: &str) -> Result<T, SdkError> {
    if response_has_error(raw) {
        return Err(decode_error(raw));
    }

    let payload = raw
        .get(key)
        .filter(|value| !value.is_null())
        .ok_or_else(|| {
            ResponseDecodeError::new(format!("response missing '{key}' payload"), Some(raw.clone()))
        })?;

    serde_json::from_value(payload.clone()).map_err(|err| {
        ResponseDecodeError::new(format!("invalid '{key}' payload: {err}"), Some(payload.clone()))
            .into()
    })
}

pub fn decode_products(raw: &Value) -> Result<Vec<Product>, SdkError> {
    decode_payload(raw, "products")
}

pub fn decode_purchaser_info(raw: &Value) -> Result<PurchaserInfo, SdkError> {
    decode_payload(raw, "purchaserInfo")
}

pub fn decode_offerings(raw: &Value) -> Result<Offerings, SdkError> {
    decode_payload(raw, "offerings")
}

/// Decode a purchase completion; the cancellation flag is read either way.
pub fn decode_purchase(raw: &Value) -> Result<PurchaseResult, PurchaseFailure> {
    if response_has_error(raw) {
        let user_cancelled = raw
            .get(USER_CANCELLED_KEY)
            .and_then(Value::as_bool)
            .unwrap_or(false);
        return Err(PurchaseFailure::new(decode_error(raw), user_cancelled));
    }

    let purchaser_info = decode_purchaser_info(raw)?;
    let product_identifier = raw
        .get("productIdentifier")
        .and_then(Value::as_str)
        .ok_or_else(|| {
            SdkError::from(ResponseDecodeError::new(
                "purchase response missing 'productIdentifier'",
                Some(raw.clone()),
            ))
        })?
        .to_string();

    Ok(PurchaseResult {
        product_identifier,
        purchaser_info,
    })
}

/// Decode the product-id keyed eligibility map.
pub fn decode_eligibility(raw: &Value) -> Result<HashMap<String, IntroEligibility>, SdkError> {
    if response_has_error(raw) {
        return Err(decode_error(raw));
    }

    let entries = raw.as_object().ok_or_else(|| {
        ResponseDecodeError::new("eligibility response is not an object", Some(raw.clone()))
    })?;

    entries
        .iter()
        .filter(|(key, _)| key.as_str() != REQUEST_ID_KEY)
        .map(|(product_identifier, entry)| -> Result<(String, IntroEligibility), SdkError> {
            let eligibility = serde_json::from_value(entry.clone()).map_err(|err| {
                ResponseDecodeError::new(
                    format!("invalid eligibility for '{product_identifier}': {err}"),
                    Some(entry.clone()),
                )
            })?;
            Ok((product_identifier.clone(), eligibility))
        })
        .collect()
}
