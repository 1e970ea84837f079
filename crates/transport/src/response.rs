use serde::de::DeserializeOwned;
use tempfile::TempPath;

/// Response payload: buffered bytes, or a temp file for downloads.
#[derive(Debug)]
pub enum ResponseBody {
    Bytes(Vec<u8>),
    /// Removed from disk when dropped.
    File(TempPath),
}

#[derive(Debug)]
pub struct TransportResponse {
    pub status: u16,
    /// Lower-cased names.
    pub headers: Vec<(String, String)>,
    pub url: String,
    pub body: ResponseBody,
}

impl TransportResponse {
    pub fn from_bytes(status: u16, body: impl Into<Vec<u8>>) -> Self {
        Self {
            status,
            headers: Vec::new(),
            url: String::new(),
            body: ResponseBody::Bytes(body.into()),
        }
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        let name = name.to_ascii_lowercase();
        self.headers
            .iter()
            .find(|(k, _)| *k == name)
            .map(|(_, v)| v.as_str())
    }

    /// Buffered bytes; empty for file responses.
    pub fn bytes(&self) -> &[u8] {
        match &self.body {
            ResponseBody::Bytes(b) => b,
            ResponseBody::File(_) => &[],
        }
    }

    pub fn json<T: DeserializeOwned>(&self) -> serde_json::Result<T> {
        serde_json::from_slice(self.bytes())
    }

    pub fn text(&self) -> String {
        String::from_utf8_lossy(self.bytes()).into_owned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn header_lookup_is_case_insensitive() {
        let mut resp = TransportResponse::from_bytes(200, "[1]");
        resp.headers.push(("content-type".into(), "application/json".into()));
        assert_eq!(resp.header("Content-Type"), Some("application/json"));
    }

    #[test]
    fn json_decodes_buffered_body() {
        let resp = TransportResponse::from_bytes(200, "[17000000000000000]");
        let v: Vec<u64> = resp.json().unwrap();
        assert_eq!(v, vec![17_000_000_000_000_000]);
    }
}
