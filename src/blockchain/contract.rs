// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Oracle contract interface and conversion of its ABI types.

use alloy::{rpc::types::Log, sol};

use super::client::ChainError;
use crate::models::{
    Condition, HttpMethod, KeyValue, RequestData, RequestEvent, ResponseField,
};

// The oracle contract surface used by the bridge. `method` is a Solidity enum,
// ABI-encoded as its `uint8` ordinal.
sol! {
    #[sol(rpc)]
    interface IOracle {
        struct KeyValue {
            string key;
            string value;
            bool encrypted;
        }

        struct Condition {
            string operator;
            string value;
            bool encrypted;
        }

        struct ResponseField {
            string path;
            string responseType;
            Condition condition;
        }

        struct RequestData {
            uint8 method;
            string url;
            bool urlEncrypted;
            KeyValue[] headers;
            KeyValue[] queryParams;
            string body;
            bool bodyEncrypted;
            ResponseField[] responseFields;
        }

        event RestApiRequest(bytes32 indexed requestId, address indexed requester, RequestData request);

        function fulfillRequest(bytes32 requestId, bytes response) external;
        function getPublicKey() external view returns (string);
    }
}

impl From<IOracle::KeyValue> for KeyValue {
    fn from(kv: IOracle::KeyValue) -> Self {
        Self {
            key: kv.key,
            value: kv.value,
            encrypted: kv.encrypted,
        }
    }
}

impl From<IOracle::ResponseField> for ResponseField {
    fn from(field: IOracle::ResponseField) -> Self {
        Self {
            path: field.path,
            response_type: field.responseType,
            condition: Some(Condition {
                operator: field.condition.operator,
                value: field.condition.value,
                encrypted: field.condition.encrypted,
            }),
        }
    }
}

impl TryFrom<IOracle::RequestData> for RequestData {
    type Error = ChainError;

    fn try_from(data: IOracle::RequestData) -> Result<Self, Self::Error> {
        let method = HttpMethod::try_from(data.method).map_err(ChainError::Decode)?;

        Ok(Self {
            method,
            url: data.url,
            url_encrypted: data.urlEncrypted,
            headers: data.headers.into_iter().map(Into::into).collect(),
            query_params: data.queryParams.into_iter().map(Into::into).collect(),
            body: data.body,
            body_encrypted: data.bodyEncrypted,
            response_fields: data.responseFields.into_iter().map(Into::into).collect(),
        })
    }
}

/// Decode a `RestApiRequest` log into a [`RequestEvent`].
pub fn decode_request_log(log: &Log) -> Result<RequestEvent, ChainError> {
    let decoded = log
        .log_decode::<IOracle::RestApiRequest>()
        .map_err(|e| ChainError::Decode(e.to_string()))?;
    let event = decoded.inner.data;

    let block_number = log
        .block_number
        .ok_or_else(|| ChainError::Decode("log has no block number".to_string()))?;

    Ok(RequestEvent {
        request_id: format!("{:#x}", event.requestId),
        requester: event.requester.to_checksum(None),
        request: RequestData::try_from(event.request)?,
        block_number,
        log_index: log.log_index.unwrap_or_default(),
        transaction_hash: log
            .transaction_hash
            .map(|h| format!("{h:#x}"))
            .unwrap_or_default(),
    })
}
