//! Validated test cases

use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use url::Url;

use crate::error::TowelError;

/// Content type sent with POST bodies when the document names none
pub const DEFAULT_REQUEST_CONTENT_TYPE: &str = "application/json";

/// Response content type expected when the document names none
pub const DEFAULT_CONTENT_TYPE: &str = "text/html";

/// Response status expected when the document names none
pub const DEFAULT_STATUS: u16 = 200;

/// What a test case does
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Method {
    Get,
    Post,
    /// Run a local script instead of talking to the server
    Setup,
}

impl Method {
    pub fn as_str(&self) -> &'static str {
        match self {
            Method::Get => "get",
            Method::Post => "post",
            Method::Setup => "setup",
        }
    }
}

impl FromStr for Method {
    type Err = TowelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "get" => Ok(Method::Get),
            "post" => Ok(Method::Post),
            "setup" => Ok(Method::Setup),
            _ => Err(TowelError::InvalidMethod(s.to_string())),
        }
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One request of a test suite, with every path and URL already resolved
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TestCase {
    /// 1-based position in the document
    pub index: usize,

    pub method: Method,

    /// Absolute URL; always present for GET and POST
    pub url: Option<Url>,

    /// Golden file; always present for GET and POST, never for SETUP
    pub result_path: Option<PathBuf>,

    /// POST body or SETUP script
    pub request_data_path: Option<PathBuf>,

    pub request_content_type: String,

    pub expected_status: u16,

    /// Case-folded, without parameters
    pub expected_content_type: String,

    pub help: Option<String>,
}

impl TestCase {
    pub fn is_setup(&self) -> bool {
        self.method == Method::Setup
    }

    pub fn label(&self) -> String {
        if self.is_setup() {
            let script = self
                .request_data_path
                .as_ref()
                .map(|p| p.display().to_string())
                .unwrap_or_default();
            return format!("Setup script <{}>", script);
        }

        let name = match (&self.help, &self.result_path) {
            (Some(help), _) => help.clone(),
            (None, Some(result)) => result.display().to_string(),
            (None, None) => String::new(),
        };
        format!("Testcase <{}>", name)
    }
}

impl fmt::Display for TestCase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.label())
    }
}
