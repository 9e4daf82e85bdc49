//! Graph database transactions.
//!
//! [`GraphTxn`] is the seam the pipeline talks to. [`DgraphTxn`] drives a
//! Dgraph alpha over its HTTP API; [`RecordingTxn`] keeps everything in
//! memory and hands out sequential identifiers.

use crate::batch::MutationPayload;
use crate::error::{LoaderError, Result};
use crate::feed::Feed;
use crate::resolver::UidMap;
use log::{debug, info};
use reqwest::blocking::Client;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::value::RawValue;
use serde_json::Value;
use std::time::Duration;

/// Schema applied by `--apply-schema`.
pub const SCHEMA: &str = r#"
id: string @index(hash) .
name: string .
age: int .
price: int .
buyer_id: uid @reverse .
ip: string @index(hash) .
device: string .
product_ids: [uid] @reverse .

type Buyer {
  id
  name
  age
}

type Product {
  id
  name
  price
}

type Transaction {
  id
  buyer_id
  ip
  device
  product_ids
}
"#;

/// One open database transaction.
pub trait GraphTxn {
    /// Applies one batch and returns the identifiers assigned to its blank nodes.
    fn mutate(&mut self, payload: &MutationPayload) -> Result<UidMap>;

    /// Commits every mutation applied so far.
    fn commit(&mut self) -> Result<()>;
}

/// HTTP client for a Dgraph alpha.
pub struct DgraphClient {
    client: Client,
    base_url: String,
}

impl DgraphClient {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(DgraphClient {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    /// Replaces the predicate and type schema.
    pub fn alter_schema(&self, schema: &str) -> Result<()> {
        let resp = self
            .client
            .post(format!("{}/alter", self.base_url))
            .body(schema.to_string())
            .send()?;
        let _: Value = read_response(resp)?;
        info!("Schema applied");
        Ok(())
    }

    /// Opens a transaction. It starts on the server with the first mutation.
    pub fn new_txn(&self) -> DgraphTxn<'_> {
        DgraphTxn {
            client: self,
            context: TxnContext::default(),
        }
    }
}

/// Transaction against a [`DgraphClient`].
pub struct DgraphTxn<'a> {
    client: &'a DgraphClient,
    context: TxnContext,
}

#[derive(Debug, Default, Deserialize)]
struct TxnContext {
    #[serde(default)]
    start_ts: u64,
    #[serde(default)]
    keys: Vec<String>,
    #[serde(default)]
    preds: Vec<String>,
    #[serde(default)]
    hash: String,
}

impl TxnContext {
    fn merge(&mut self, other: TxnContext) {
        if self.start_ts == 0 {
            self.start_ts = other.start_ts;
        }
        if !other.hash.is_empty() {
            self.hash = other.hash;
        }
        self.keys.extend(other.keys);
        self.preds.extend(other.preds);
    }

    /// Query parameters binding a request to the server-side transaction.
    fn params(&self) -> Vec<(&'static str, String)> {
        let mut params = Vec::new();
        if self.start_ts != 0 {
            params.push(("startTs", self.start_ts.to_string()));
            if !self.hash.is_empty() {
                params.push(("hash", self.hash.clone()));
            }
        }
        params
    }
}

#[derive(Serialize)]
struct MutateRequest<'a> {
    set: &'a RawValue,
}

#[derive(Serialize)]
struct CommitRequest<'a> {
    keys: &'a [String],
    preds: &'a [String],
}

#[derive(Debug, Deserialize)]
struct Envelope<T> {
    data: Option<T>,
    #[serde(default)]
    errors: Vec<ErrorEntry>,
    extensions: Option<Extensions>,
}

#[derive(Debug, Deserialize)]
struct ErrorEntry {
    message: String,
}

#[derive(Debug, Deserialize)]
struct Extensions {
    txn: Option<TxnContext>,
}

#[derive(Debug, Deserialize)]
struct MutationData {
    #[serde(default)]
    uids: Option<UidMap>,
}

/// Checks the status and the error list, returns the decoded envelope.
fn read_envelope<T: DeserializeOwned>(resp: reqwest::blocking::Response) -> Result<Envelope<T>> {
    let status = resp.status();
    if !status.is_success() {
        let message = resp.text().unwrap_or_default();
        return Err(LoaderError::Transport(format!(
            "status {}: {}",
            status.as_u16(),
            message
        )));
    }

    let envelope: Envelope<T> = resp.json()?;
    if !envelope.errors.is_empty() {
        let messages: Vec<_> = envelope.errors.iter().map(|e| e.message.as_str()).collect();
        return Err(LoaderError::Transport(messages.join("; ")));
    }
    Ok(envelope)
}

fn read_response<T: DeserializeOwned>(resp: reqwest::blocking::Response) -> Result<T> {
    read_envelope(resp)?
        .data
        .ok_or_else(|| LoaderError::Transport("response carries no data".to_string()))
}

impl GraphTxn for DgraphTxn<'_> {
    fn mutate(&mut self, payload: &MutationPayload) -> Result<UidMap> {
        let set = RawValue::from_string(payload.as_json().to_string())?;

        let resp = self
            .client
            .client
            .post(format!("{}/mutate", self.client.base_url))
            .query(&[("commitNow", "false")])
            .query(&self.context.params())
            .json(&MutateRequest { set: &set })
            .send()?;
        let envelope: Envelope<MutationData> = read_envelope(resp)?;
        if let Some(txn) = envelope.extensions.and_then(|e| e.txn) {
            self.context.merge(txn);
        }
        debug!(
            "Mutation for {} applied at start_ts {}",
            payload.feed(),
            self.context.start_ts
        );

        Ok(envelope.data.and_then(|d| d.uids).unwrap_or_default())
    }

    fn commit(&mut self) -> Result<()> {
        if self.context.start_ts == 0 {
            debug!("Nothing to commit");
            return Ok(());
        }

        let resp = self
            .client
            .client
            .post(format!("{}/commit", self.client.base_url))
            .query(&self.context.params())
            .json(&CommitRequest {
                keys: &self.context.keys,
                preds: &self.context.preds,
            })
            .send()?;
        let _: Value = read_response(resp)?;
        info!("Committed transaction {}", self.context.start_ts);
        Ok(())
    }
}

/// In-memory transaction assigning `0x1`, `0x2`, ... to blank nodes in
/// submission order.
#[derive(Debug, Default)]
pub struct RecordingTxn {
    mutations: Vec<MutationPayload>,
    next_uid: u64,
    committed: bool,
    fail_on: Option<Feed>,
}

impl RecordingTxn {
    pub fn new() -> Self {
        Self::default()
    }

    /// A transaction whose mutation for `feed` fails with a transport error.
    pub fn failing_on(feed: Feed) -> Self {
        RecordingTxn {
            fail_on: Some(feed),
            ..Self::default()
        }
    }

    /// Payloads received, in order.
    pub fn mutations(&self) -> &[MutationPayload] {
        &self.mutations
    }

    pub fn is_committed(&self) -> bool {
        self.committed
    }
}

impl GraphTxn for RecordingTxn {
    fn mutate(&mut self, payload: &MutationPayload) -> Result<UidMap> {
        if self.fail_on == Some(payload.feed()) {
            return Err(LoaderError::Transport(format!(
                "mutation for {} rejected",
                payload.feed()
            )));
        }

        let nodes: Vec<Value> = serde_json::from_str(payload.as_json())?;
        let mut uids = UidMap::new();
        for node in &nodes {
            let label = node
                .get("uid")
                .and_then(Value::as_str)
                .and_then(|uid| uid.strip_prefix("_:"));
            if let Some(label) = label {
                if !uids.contains_key(label) {
                    self.next_uid += 1;
                    uids.insert(label.to_string(), format!("{:#x}", self.next_uid));
                }
            }
        }

        self.mutations.push(payload.clone());
        Ok(uids)
    }

    fn commit(&mut self) -> Result<()> {
        self.committed = true;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::product::decode_product;
    use std::io::{Read, Write};
    use std::net::{TcpListener, TcpStream};
    use std::thread::{self, JoinHandle};

    /// Request line and body of one request seen by [`serve`].
    type Seen = (String, String);

    /// Answers one request per canned body, in order, then stops.
    fn serve(bodies: Vec<&'static str>) -> (String, JoinHandle<Vec<Seen>>) {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let base_url = format!("http://{}", listener.local_addr().unwrap());
        let handle = thread::spawn(move || {
            bodies
                .into_iter()
                .map(|body| {
                    let (mut stream, _) = listener.accept().unwrap();
                    let seen = read_request(&mut stream);
                    write!(
                        stream,
                        "HTTP/1.1 200 OK\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
                        body.len(),
                        body
                    )
                    .unwrap();
                    seen
                })
                .collect()
        });
        (base_url, handle)
    }

    fn read_request(stream: &mut TcpStream) -> Seen {
        let mut buf = Vec::new();
        let mut chunk = [0u8; 4096];
        let mut fill = |buf: &mut Vec<u8>| {
            let n = stream.read(&mut chunk).unwrap();
            assert!(n > 0, "connection closed mid-request");
            buf.extend_from_slice(&chunk[..n]);
        };

        let header_end = loop {
            if let Some(pos) = buf.windows(4).position(|w| w == b"\r\n\r\n") {
                break pos + 4;
            }
            fill(&mut buf);
        };
        let head = String::from_utf8_lossy(&buf[..header_end]).to_string();
        let length = head
            .lines()
            .filter_map(|line| line.split_once(':'))
            .find(|(name, _)| name.eq_ignore_ascii_case("content-length"))
            .map(|(_, value)| value.trim().parse::<usize>().unwrap())
            .unwrap_or(0);
        while buf.len() < header_end + length {
            fill(&mut buf);
        }

        let request_line = head.lines().next().unwrap().to_string();
        let body = String::from_utf8_lossy(&buf[header_end..header_end + length]).to_string();
        (request_line, body)
    }

    fn payload(feed: Feed, ids: &[&str]) -> MutationPayload {
        let products: Vec<_> = ids
            .iter()
            .map(|id| decode_product(&[*id, "Widget", "20"]).unwrap())
            .collect();
        MutationPayload::encode(feed, &products).unwrap()
    }

    const FIRST_MUTATION: &str = r#"{"data":{"code":"Success","message":"Done","uids":{"p_10":"0x5"}},"extensions":{"txn":{"start_ts":12,"hash":"h12","keys":["k1"],"preds":["1-name"]}}}"#;
    const SECOND_MUTATION: &str = r#"{"data":{"code":"Success","message":"Done","uids":{"p_11":"0x6"}},"extensions":{"txn":{"start_ts":12,"hash":"h12","keys":["k2"],"preds":["1-price"]}}}"#;
    const COMMITTED: &str = r#"{"data":{"code":"Success","message":"Done"}}"#;

    #[test]
    fn test_dgraph_txn_request_sequence() {
        let (base_url, server) = serve(vec![FIRST_MUTATION, SECOND_MUTATION, COMMITTED]);
        let client = DgraphClient::new(&base_url, Duration::from_secs(5)).unwrap();
        let mut txn = client.new_txn();

        let first = txn.mutate(&payload(Feed::Products, &["10"])).unwrap();
        assert_eq!(first.get("p_10").map(String::as_str), Some("0x5"));
        let second = txn.mutate(&payload(Feed::Products, &["11"])).unwrap();
        assert_eq!(second.get("p_11").map(String::as_str), Some("0x6"));
        txn.commit().unwrap();

        let seen = server.join().unwrap();
        assert_eq!(seen[0].0, "POST /mutate?commitNow=false HTTP/1.1");
        assert_eq!(
            seen[1].0,
            "POST /mutate?commitNow=false&startTs=12&hash=h12 HTTP/1.1"
        );
        assert_eq!(seen[2].0, "POST /commit?startTs=12&hash=h12 HTTP/1.1");

        let set: Value = serde_json::from_str(&seen[0].1).unwrap();
        assert_eq!(set["set"][0]["uid"], "_:p_10");
        assert_eq!(set["set"][0]["dgraph.type"][0], "Product");

        let commit: Value = serde_json::from_str(&seen[2].1).unwrap();
        assert_eq!(
            commit,
            serde_json::json!({"keys": ["k1", "k2"], "preds": ["1-name", "1-price"]})
        );
    }

    #[test]
    fn test_dgraph_commit_without_mutations_sends_nothing() {
        // Nothing listens on port 1; a request would fail.
        let client = DgraphClient::new("http://127.0.0.1:1", Duration::from_secs(1)).unwrap();
        let mut txn = client.new_txn();
        assert!(txn.commit().is_ok());
    }

    #[test]
    fn test_dgraph_error_envelope_fails_mutation() {
        let (base_url, server) = serve(vec![
            r#"{"errors":[{"message":"predicate not indexed","extensions":{"code":"ErrorInvalidRequest"}}],"data":null}"#,
        ]);
        let client = DgraphClient::new(&base_url, Duration::from_secs(5)).unwrap();
        let mut txn = client.new_txn();

        let err = txn.mutate(&payload(Feed::Products, &["10"])).unwrap_err();
        assert!(matches!(err, LoaderError::Transport(ref m) if m.contains("predicate not indexed")));
        server.join().unwrap();
    }

    #[test]
    fn test_recording_txn_assigns_sequential_uids() {
        let products = vec![
            decode_product(&["10", "Widget", "20"]).unwrap(),
            decode_product(&["11", "Gadget", "30"]).unwrap(),
        ];
        let payload = MutationPayload::encode(Feed::Products, &products).unwrap();

        let mut txn = RecordingTxn::new();
        let uids = txn.mutate(&payload).unwrap();
        assert_eq!(uids.get("p_10").map(String::as_str), Some("0x1"));
        assert_eq!(uids.get("p_11").map(String::as_str), Some("0x2"));
        assert!(!txn.is_committed());

        txn.commit().unwrap();
        assert!(txn.is_committed());
    }

    #[test]
    fn test_txn_context_merge_keeps_first_start_ts() {
        let mut context = TxnContext::default();
        context.merge(TxnContext {
            start_ts: 7,
            keys: vec!["k1".to_string()],
            preds: vec!["1-name".to_string()],
            hash: "abc".to_string(),
        });
        context.merge(TxnContext {
            start_ts: 7,
            keys: vec!["k2".to_string()],
            preds: vec![],
            hash: String::new(),
        });
        assert_eq!(context.start_ts, 7);
        assert_eq!(context.hash, "abc");
        assert_eq!(context.keys, vec!["k1", "k2"]);
        assert_eq!(context.preds, vec!["1-name"]);
    }

    #[test]
    fn test_mutation_envelope_decodes_uids() {
        let body = r#"{
            "data": {"code": "Success", "message": "Done", "uids": {"b_1": "0x5"}},
            "extensions": {"txn": {"start_ts": 12, "keys": ["a"], "preds": ["1-age"]}}
        }"#;
        let envelope: Envelope<MutationData> = serde_json::from_str(body).unwrap();
        assert!(envelope.errors.is_empty());
        let uids = envelope.data.and_then(|d| d.uids).unwrap();
        assert_eq!(uids.get("b_1").map(String::as_str), Some("0x5"));
        assert_eq!(envelope.extensions.and_then(|e| e.txn).unwrap().start_ts, 12);
    }

    #[test]
    fn test_error_envelope_decodes_messages() {
        let body = r#"{"errors": [{"message": "bad mutation", "extensions": {"code": "ErrorInvalidRequest"}}], "data": null}"#;
        let envelope: Envelope<MutationData> = serde_json::from_str(body).unwrap();
        assert_eq!(envelope.errors.len(), 1);
        assert_eq!(envelope.errors[0].message, "bad mutation");
        assert!(envelope.data.is_none());
    }
}
