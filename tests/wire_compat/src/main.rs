fn main() {
    println!("Run `cargo test -p wire-compat` to execute wire compatibility tests.");
}

#[cfg(test)]
mod tests {
    use std::fs;
    use std::path::PathBuf;

    use kady_protocol::constants::{TOKEN_LENGTH, WS_MAX_MESSAGE_SIZE};
    use kady_protocol::{
        CredentialsPayload, Frame, HeartbeatPayload, Inbound, OpCode, TransmitTokenPayload,
    };

    /// Returns the path to the fixtures directory.
    fn fixtures_dir() -> PathBuf {
        PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("fixtures")
    }

    fn read_fixture(name: &str) -> String {
        let path = fixtures_dir().join(name);
        fs::read_to_string(&path)
            .unwrap_or_else(|e| panic!("failed to read fixture {}: {e}", path.display()))
    }

    /// Loads a fixture JSON file and returns it as a `serde_json::Value`.
    fn load_fixture(name: &str) -> serde_json::Value {
        serde_json::from_str(&read_fixture(name))
            .unwrap_or_else(|e| panic!("failed to parse fixture {name}: {e}"))
    }

    /// Deserializes a fixture into a Rust type, re-serializes it, and compares
    /// the JSON values (order-independent).
    fn roundtrip_test<T>(name: &str)
    where
        T: serde::de::DeserializeOwned + serde::Serialize,
    {
        let fixture = load_fixture(name);
        let parsed: T = serde_json::from_value(fixture.clone())
            .unwrap_or_else(|e| panic!("failed to deserialize {name}: {e}"));
        let reserialized = serde_json::to_value(&parsed)
            .unwrap_or_else(|e| panic!("failed to re-serialize {name}: {e}"));

        assert_eq!(
            fixture, reserialized,
            "roundtrip mismatch for {name}:\n  wire: {fixture}\n  Rust: {reserialized}"
        );
    }

    /// Decodes a fixture the way the session does on inbound text.
    fn decode_fixture(name: &str) -> Frame {
        match Frame::decode(&read_fixture(name), WS_MAX_MESSAGE_SIZE) {
            Ok(Inbound::Known(frame)) => frame,
            other => panic!("fixture {name} did not decode to a known frame: {other:?}"),
        }
    }

    #[test]
    fn fixture_credentials_frame() {
        roundtrip_test::<Frame>("credentials_frame.json");

        let frame = decode_fixture("credentials_frame.json");
        assert_eq!(frame.op, OpCode::Credentials);
        roundtrip_payload::<CredentialsPayload>(&frame);
    }

    #[test]
    fn fixture_connected_frame() {
        roundtrip_test::<Frame>("connected_frame.json");

        let frame = decode_fixture("connected_frame.json");
        assert_eq!(frame, Frame::empty(OpCode::Connected));
    }

    #[test]
    fn fixture_transmit_token_frame() {
        roundtrip_test::<Frame>("transmit_token_frame.json");

        let frame = decode_fixture("transmit_token_frame.json");
        assert_eq!(frame.op, OpCode::TransmitToken);
        let payload: TransmitTokenPayload = roundtrip_payload(&frame);
        assert_eq!(payload.token.len(), TOKEN_LENGTH);
        assert!(payload.token.chars().all(|c| c.is_ascii_alphanumeric()));
        assert!(payload.acknowledges_connection());
    }

    #[test]
    fn fixture_heartbeat_frame() {
        roundtrip_test::<Frame>("heartbeat_frame.json");

        let frame = decode_fixture("heartbeat_frame.json");
        let payload: HeartbeatPayload = roundtrip_payload(&frame);
        assert_eq!(payload.since_last_ms, 41_250);
    }

    #[test]
    fn encoded_frames_match_fixtures() {
        let creds = CredentialsPayload {
            id: "admin".into(),
            secret: "hunter2".into(),
        };
        let text = Frame::new(OpCode::Credentials, &creds)
            .unwrap()
            .to_text()
            .unwrap();
        let encoded: serde_json::Value = serde_json::from_str(&text).unwrap();
        assert_eq!(encoded, load_fixture("credentials_frame.json"));

        let text = Frame::empty(OpCode::Connected).to_text().unwrap();
        let encoded: serde_json::Value = serde_json::from_str(&text).unwrap();
        assert_eq!(encoded, load_fixture("connected_frame.json"));
    }

    /// Parses a frame payload and checks it re-serializes unchanged.
    fn roundtrip_payload<T>(frame: &Frame) -> T
    where
        T: serde::de::DeserializeOwned + serde::Serialize,
    {
        let parsed: T = frame
            .parse_payload()
            .unwrap_or_else(|e| panic!("payload of {} did not parse: {e}", frame.op));
        assert_eq!(serde_json::to_value(&parsed).unwrap(), frame.payload);
        parsed
    }
}
