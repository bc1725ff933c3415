//! Per-provider request dialects.
//!
//! Each supported logger differs in its login endpoint, the names of its
//! credential fields, the constant form fields it expects, the text it
//! answers with on bad credentials, and how the uploaded file is encoded.

use oneadif_core::Provider;

/// How login fields are sent.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoginEncoding {
    /// `application/x-www-form-urlencoded`.
    Form,
    /// JSON object; the provider answers with a session token.
    JsonToken,
}

/// How the file is sent.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UploadEncoding {
    /// `multipart/form-data` with the file in the named part.
    Multipart { field: &'static str },
    /// JSON object `{token, files: [{name, file}], ...params}`.
    Json,
}

#[derive(Debug, Clone)]
pub struct Dialect {
    pub provider: Provider,
    pub base_url: String,
    pub login_path: &'static str,
    pub login_encoding: LoginEncoding,
    /// Constant fields added to every login request.
    pub login_extra: &'static [(&'static str, &'static str)],
    /// Credential fields that must be present in the stored login data.
    pub credential_fields: [&'static str; 2],
    /// Response text that means the credentials were rejected.
    pub login_failure_marker: &'static str,
    pub upload_path: &'static str,
    pub upload_encoding: UploadEncoding,
    /// Response text that means the provider refused the file.
    pub upload_failure_marker: &'static str,
}

const LOGIN_PASSWORD: [&str; 2] = ["login", "password"];

impl Dialect {
    pub fn for_provider(provider: Provider) -> Self {
        match provider {
            Provider::Lotw => Self {
                provider,
                base_url: "https://lotw.arrl.org".into(),
                login_path: "/lotwuser/login",
                login_encoding: LoginEncoding::Form,
                login_extra: &[("acct_sel", ""), ("thisForm", "login")],
                credential_fields: LOGIN_PASSWORD,
                login_failure_marker: "Username/password incorrect",
                upload_path: "/lotwuser/upload",
                upload_encoding: UploadEncoding::Multipart { field: "upfile" },
                upload_failure_marker: "File rejected",
            },
            Provider::Eqsl => Self {
                provider,
                base_url: "https://www.eqsl.cc".into(),
                login_path: "/QSLCard/LoginFinish.cfm",
                login_encoding: LoginEncoding::Form,
                login_extra: &[("Login", "Go")],
                credential_fields: ["Callsign", "EnteredPassword"],
                login_failure_marker: "Callsign or Password Error!",
                upload_path: "/QSLCard/ImportADIF.cfm",
                upload_encoding: UploadEncoding::Multipart { field: "Filename" },
                upload_failure_marker: "Error:",
            },
            Provider::Hamlog => Self {
                provider,
                base_url: "https://hamlog.ru".into(),
                login_path: "/lk/login.php",
                login_encoding: LoginEncoding::Form,
                login_extra: &[],
                credential_fields: LOGIN_PASSWORD,
                login_failure_marker: "Ошибка! Неверный адрес и/или пароль",
                upload_path: "/lk/upload.php",
                upload_encoding: UploadEncoding::Multipart { field: "file" },
                upload_failure_marker: "Ошибка!",
            },
            Provider::Cfmrda => Self {
                provider,
                base_url: "https://dev.cfmrda.ru".into(),
                login_path: "/aiohttp/login",
                login_encoding: LoginEncoding::JsonToken,
                login_extra: &[("mode", "login")],
                credential_fields: LOGIN_PASSWORD,
                login_failure_marker: "Login failed",
                upload_path: "/aiohttp/adif",
                upload_encoding: UploadEncoding::Json,
                upload_failure_marker: "Upload failed",
            },
        }
    }

    /// Point the dialect at another host, keeping its paths.
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    pub fn login_url(&self) -> String {
        format!("{}{}", self.base_url, self.login_path)
    }

    pub fn upload_url(&self) -> String {
        format!("{}{}", self.base_url, self.upload_path)
    }
}
