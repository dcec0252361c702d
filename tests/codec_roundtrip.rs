use std::collections::BTreeMap;

use anyhow::Result;
use oorandom::Rand64;

use QuiverSnap::codec::{decode, encode, is_encodable_body};

const KEY_CHARS: &[u8] = b"abcdefXYZ0123._-[]=:";
const BODY_CHARS: &[u8] = b"abc xyz 01 = [] {}\":,.-_";

fn pick(rng: &mut Rand64, alphabet: &[u8]) -> char {
    alphabet[(rng.rand_u64() % alphabet.len() as u64) as usize] as char
}

fn random_key(rng: &mut Rand64) -> String {
    let len = 1 + (rng.rand_u64() % 16) as usize;
    (0..len).map(|_| pick(rng, KEY_CHARS)).collect()
}

fn random_body(rng: &mut Rand64) -> String {
    loop {
        let n = (rng.rand_u64() % 6) as usize;
        let mut lines = Vec::with_capacity(n);
        for _ in 0..n {
            let len = (rng.rand_u64() % 12) as usize;
            let line: String = (0..len).map(|_| pick(rng, BODY_CHARS)).collect();
            lines.push(line);
        }
        let body = lines.join("\n");
        if is_encodable_body(&body) {
            return body;
        }
    }
}

#[test]
fn random_mappings_roundtrip_and_encode_is_idempotent() -> Result<()> {
    let mut rng = Rand64::new(0x5AA9_5EED_u128);

    for round in 0..300 {
        let count = (rng.rand_u64() % 8) as usize;
        let mut m = BTreeMap::new();
        for _ in 0..count {
            m.insert(random_key(&mut rng), random_body(&mut rng));
        }

        let text = encode(&m);
        let back = decode(&text)?;
        assert_eq!(back, m, "round {round}: decode(encode(m)) != m\n{text:?}");
        assert_eq!(encode(&back), text, "round {round}: encode is not idempotent");
    }
    Ok(())
}

#[test]
fn empty_mapping_encodes_to_empty_text() -> Result<()> {
    let m: BTreeMap<String, String> = BTreeMap::new();
    assert_eq!(encode(&m), "");
    assert!(decode("")?.is_empty());
    assert!(decode("\n\n")?.is_empty());
    Ok(())
}

#[test]
fn crlf_files_decode_like_lf_files() -> Result<()> {
    let lf = decode("A.one=\nfoo\nbar\n\n\nA.two=\nbaz\n")?;
    let crlf = decode("A.one=\r\nfoo\r\nbar\r\n\r\n\r\nA.two=\r\nbaz\r\n")?;
    assert_eq!(lf, crlf);
    assert_eq!(lf.get("A.one").map(String::as_str), Some("foo\nbar"));
    Ok(())
}

#[test]
fn encoded_keys_are_sorted() -> Result<()> {
    let mut m = BTreeMap::new();
    m.insert("b.test".to_string(), "2".to_string());
    m.insert("a.test".to_string(), "1".to_string());
    m.insert("a.test[x]".to_string(), String::new());
    assert_eq!(encode(&m), "a.test=\n1\n\n\na.test[x]=\n\n\nb.test=\n2\n");
    Ok(())
}

#[test]
fn malformed_headers_report_their_line() {
    let err = decode("A.one=\nfoo\n\n\nnot a header\nbody\n").unwrap_err();
    assert_eq!(err.line, 5);

    let err = decode("=\nbody\n").unwrap_err();
    assert_eq!(err.line, 1);

    let err = decode("A.one=\nx\n\n\nA.one=\ny\n").unwrap_err();
    assert!(err.message.contains("duplicate"), "{}", err.message);
}
