use super::{parts_for, sign, test_credential, test_time};
use anyhow::Result;
use awssign_aws_v4::{
    extract_seed_signature, EventFrameSigner, FrameHeaderValue, RequestSigner, SignedFrameStream,
};
use awssign_core::time::Clock;
use bytes::Bytes;
use http::Method;
use pretty_assertions::assert_eq;

/// Open a streaming session: sign the initiating request, seed the frame
/// signer from its signature, then sign events as they flow.
#[tokio::test]
async fn test_event_stream_end_to_end() -> Result<()> {
    let signer = RequestSigner::new("transcribe", "us-east-1").with_time(test_time());
    let cred = test_credential();

    let mut parts = parts_for(
        Method::POST,
        "http://transcribestreaming.us-east-1.amazonaws.com/stream-transcription",
    );
    sign(&signer, &mut parts, &cred, None).await?;

    let seed = extract_seed_signature(&parts.headers)?;
    let mut frame_signer = EventFrameSigner::new(cred, "us-east-1", "transcribe", &seed)
        .with_clock(Clock::fixed(test_time()));

    assert_eq!(frame_signer.prior_signature(), seed);

    let first = frame_signer.sign_frame(b"audio-bytes-1")?;
    let second = frame_signer.sign_frame(b"audio-bytes-2")?;

    // Each frame chains off the one before it.
    assert_ne!(first.signature, seed);
    assert_ne!(second.signature, first.signature);
    assert_eq!(frame_signer.prior_signature(), second.signature);

    // Frames carry their date and signature headers in wire order.
    assert_eq!(first.headers[0].name, ":date");
    assert_eq!(first.headers[1].name, ":chunk-signature");
    match &first.headers[1].value {
        FrameHeaderValue::ByteArray(sig) => assert_eq!(hex::encode(sig), first.signature),
        other => panic!("unexpected header value: {other:?}"),
    }

    // The encoded headers start with the :date name length.
    let encoded = first.encoded_headers()?;
    assert_eq!(encoded[0], 5);
    assert_eq!(&encoded[1..6], b":date");
    Ok(())
}

#[tokio::test]
async fn test_event_stream_terminates_with_empty_frame() -> Result<()> {
    let signer = EventFrameSigner::new(
        test_credential(),
        "us-east-1",
        "transcribe",
        "0".repeat(64),
    )
    .with_clock(Clock::fixed(test_time()));

    let events = vec![
        Bytes::from_static(b"event-1"),
        Bytes::from_static(b"event-2"),
        Bytes::from_static(b"event-3"),
    ];
    let frames = SignedFrameStream::new(signer, events.into_iter())
        .collect::<awssign_core::Result<Vec<_>>>()?;

    assert_eq!(frames.len(), 4);
    assert!(frames[3].payload.is_empty());

    // All four signatures are distinct links of one chain.
    let mut signatures = frames.iter().map(|f| f.signature.clone()).collect::<Vec<_>>();
    signatures.dedup();
    assert_eq!(signatures.len(), 4);
    Ok(())
}
