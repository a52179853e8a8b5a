//! Declarative XML test suites
//!
//! A suite lives in `<dir>/towel.xml`:
//!
//! ```xml
//! <towel>
//!   <request method="setup" request-data="prepare.sh"/>
//!   <request method="get" url="/v3/artifacts" result="list.json"
//!            content-type="application/json" help="list artifacts"/>
//!   <request method="post" url="/v3/artifacts" result="created.json"
//!            request-data="artifact.json" status="201"
//!            content-type="application/json"/>
//! </towel>
//! ```

use std::path::Path;

use serde::Deserialize;
use tracing::debug;
use url::Url;

use crate::case::{
    Method, TestCase, DEFAULT_CONTENT_TYPE, DEFAULT_REQUEST_CONTENT_TYPE, DEFAULT_STATUS,
};
use crate::dispatch::fold_content_type;
use crate::error::{TowelError, TowelResult};

/// File name of the suite inside a test directory
pub const SUITE_FILE: &str = "towel.xml";

#[derive(Debug, Default, Deserialize)]
struct RawSuite {
    #[serde(rename = "request", default)]
    requests: Vec<RawRequest>,
}

#[derive(Debug, Default, Deserialize)]
struct RawRequest {
    #[serde(rename = "@method")]
    method: Option<String>,

    #[serde(rename = "@url")]
    url: Option<String>,

    #[serde(rename = "@result")]
    result: Option<String>,

    #[serde(rename = "@request-data")]
    request_data: Option<String>,

    #[serde(rename = "@request-content-type")]
    request_content_type: Option<String>,

    #[serde(rename = "@content-type")]
    content_type: Option<String>,

    #[serde(rename = "@status")]
    status: Option<String>,

    #[serde(rename = "@help")]
    help: Option<String>,
}

/// Load the suite at `document`, resolving file attributes against
/// `base_dir` and URLs against `base_url`.
pub fn load(document: &Path, base_dir: &Path, base_url: &Url) -> TowelResult<Vec<TestCase>> {
    if !document.is_file() {
        return Err(TowelError::MissingTestSuite(document.to_path_buf()));
    }

    let content = std::fs::read_to_string(document)?;
    let cases = parse(&content, base_dir, base_url)?;
    debug!("Loaded {} request(s) from {}", cases.len(), document.display());
    Ok(cases)
}

/// Parse suite text. Fails on the first invalid request.
pub fn parse(xml: &str, base_dir: &Path, base_url: &Url) -> TowelResult<Vec<TestCase>> {
    let raw: RawSuite =
        quick_xml::de::from_str(xml).map_err(|e| TowelError::DocumentParse(e.to_string()))?;

    raw.requests
        .into_iter()
        .enumerate()
        .map(|(i, request)| resolve(i + 1, request, base_dir, base_url))
        .collect()
}

fn resolve(index: usize, raw: RawRequest, base_dir: &Path, base_url: &Url) -> TowelResult<TestCase> {
    let method: Method = raw
        .method
        .as_deref()
        .ok_or(TowelError::MissingAttribute {
            index,
            attribute: "method",
        })?
        .parse()?;

    let url = match raw.url.as_deref() {
        Some(relative) => Some(base_url.join(relative).map_err(|e| TowelError::InvalidUrl {
            url: relative.to_string(),
            reason: e.to_string(),
        })?),
        None => None,
    };

    let result_path = match method {
        Method::Setup => None,
        Method::Get | Method::Post => {
            if url.is_none() {
                return Err(TowelError::MissingAttribute {
                    index,
                    attribute: "url",
                });
            }
            let result = raw.result.as_deref().ok_or(TowelError::MissingAttribute {
                index,
                attribute: "result",
            })?;
            Some(base_dir.join(result))
        }
    };

    let expected_status = match raw.status.as_deref() {
        Some(status) => status
            .trim()
            .parse::<u16>()
            .map_err(|_| TowelError::InvalidAttribute {
                index,
                attribute: "status",
                value: status.to_string(),
            })?,
        None => DEFAULT_STATUS,
    };

    Ok(TestCase {
        index,
        method,
        url,
        result_path,
        request_data_path: raw.request_data.as_deref().map(|p| base_dir.join(p)),
        request_content_type: raw
            .request_content_type
            .unwrap_or_else(|| DEFAULT_REQUEST_CONTENT_TYPE.to_string()),
        expected_status,
        expected_content_type: fold_content_type(
            raw.content_type.as_deref().unwrap_or(DEFAULT_CONTENT_TYPE),
        ),
        help: raw.help,
    })
}
