//! Serve-loop integration tests — request envelope → dispatch → response
//! round-trips over an in-memory worker channel.

use grpc_worker::errpack;
use grpc_worker::{
    codec, DomainError, Error, Frame, GrpcService, InvocationContext, Kernel, KernelState,
    MemoryChannel, Payload, Result, ServiceRegistrar, WorkerConfig,
};
use pretty_assertions::assert_eq;

#[derive(Clone, PartialEq, ::prost::Message)]
struct Input {
    #[prost(string, tag = "1")]
    text: String,
}

#[derive(Clone, PartialEq, ::prost::Message)]
struct Output {
    #[prost(string, tag = "1")]
    text: String,
}

struct Echo;

impl GrpcService for Echo {
    const NAME: &'static str = "Echo";

    fn register(registrar: &mut ServiceRegistrar<Self>) {
        registrar
            .unary("Say", |_s, _ctx, input: Input| {
                Ok(Output { text: input.text })
            })
            .unary("Tagged", |_s, ctx: &mut InvocationContext, input: Input| {
                ctx.set_response_header("x-echoed", input.text.clone());
                Ok(Output { text: input.text })
            })
            .unary("Fail", |_s, _ctx, _input: Input| -> Result<Output> {
                Err(DomainError::new(7, "bad", "E1").into())
            })
            .unary("Crash", |_s, _ctx, _input: Input| -> Result<Output> {
                Err(Error::Io(std::io::Error::other("db connection lost")))
            })
            .server_streaming("Tail", |_s, _ctx, input: Input| {
                Ok((0..3).map(move |i| Output {
                    text: format!("{}-{i}", input.text),
                }))
            });
    }
}

/// Build a request payload with the standard metadata envelope.
fn request(service: &str, method: &str, body: Vec<u8>) -> Payload {
    let header = serde_json::json!({
        "service": service,
        "method": method,
        "context": { "x-request-id": ["r-1"] },
    });
    Payload::new(body, serde_json::to_vec(&header).unwrap())
}

fn echo_kernel() -> Kernel {
    let mut kernel = Kernel::new(WorkerConfig::default());
    kernel.register_service(Echo).unwrap();
    kernel
}

#[tokio::test]
async fn say_round_trips_through_the_codec() {
    let mut kernel = echo_kernel();
    let mut channel = MemoryChannel::new();
    channel.push_request(request(
        "Echo",
        "Say",
        codec::encode(&Input {
            text: "hi".to_string(),
        }),
    ));

    kernel.serve(&mut channel).await.unwrap();
    assert_eq!(kernel.state(), KernelState::Stopped);

    let sent = channel.take_sent();
    assert_eq!(sent.len(), 1);
    match &sent[0] {
        Frame::Response(payload) => {
            let output: Output = codec::decode(&payload.body).unwrap();
            assert_eq!(output.text, "hi");
            assert_eq!(payload.header.as_ref(), b"{}");
        }
        other => panic!("expected a response frame, got {other:?}"),
    }
}

#[tokio::test]
async fn handler_response_headers_reach_the_envelope() {
    let mut kernel = echo_kernel();
    let mut channel = MemoryChannel::new();
    channel.push_request(request(
        "Echo",
        "Tagged",
        codec::encode(&Input {
            text: "tagged".to_string(),
        }),
    ));

    kernel.serve(&mut channel).await.unwrap();

    match &channel.take_sent()[0] {
        Frame::Response(payload) => {
            let headers: std::collections::HashMap<String, String> =
                serde_json::from_slice(&payload.header).unwrap();
            assert_eq!(headers.get("x-echoed").map(String::as_str), Some("tagged"));
        }
        other => panic!("expected a response frame, got {other:?}"),
    }
}

#[tokio::test]
async fn unknown_service_is_a_packed_not_found() {
    let mut kernel = echo_kernel();
    let mut channel = MemoryChannel::new();
    channel.push_request(request("Ghost", "Say", Vec::new()));

    kernel.serve(&mut channel).await.unwrap();

    match &channel.take_sent()[0] {
        Frame::Error(message) => {
            assert_eq!(message.as_slice(), b"5|:|Service `Ghost` not found.");
        }
        other => panic!("expected an error frame, got {other:?}"),
    }
}

#[tokio::test]
async fn unknown_method_is_a_packed_not_found_and_loop_continues() {
    let mut kernel = echo_kernel();
    let mut channel = MemoryChannel::new();
    channel
        .push_request(request("Echo", "Missing", Vec::new()))
        .push_request(request(
            "Echo",
            "Say",
            codec::encode(&Input {
                text: "still alive".to_string(),
            }),
        ));

    kernel.serve(&mut channel).await.unwrap();

    let sent = channel.take_sent();
    assert_eq!(sent.len(), 2);
    match &sent[0] {
        Frame::Error(message) => {
            assert_eq!(
                message.as_slice(),
                b"5|:|Method `Missing` not found in service `Echo`."
            );
        }
        other => panic!("expected an error frame, got {other:?}"),
    }
    match &sent[1] {
        Frame::Response(payload) => {
            let output: Output = codec::decode(&payload.body).unwrap();
            assert_eq!(output.text, "still alive");
        }
        other => panic!("expected a response frame, got {other:?}"),
    }
}

#[tokio::test]
async fn domain_error_packs_with_the_sentinel_status() {
    let mut kernel = echo_kernel();
    let mut channel = MemoryChannel::new();
    channel.push_request(request("Echo", "Fail", Vec::new()));

    kernel.serve(&mut channel).await.unwrap();

    match &channel.take_sent()[0] {
        Frame::Error(message) => {
            assert!(message.starts_with(b"99|:|"));
            let unpacked = errpack::unpack(message).unwrap();
            assert!(unpacked.is_service_exception());
            let domain = DomainError::from_packed_message(&unpacked.message).unwrap();
            assert_eq!(domain, DomainError::new(7, "bad", "E1"));
        }
        other => panic!("expected an error frame, got {other:?}"),
    }
}

#[tokio::test]
async fn system_error_sends_short_message_outside_debug_mode() {
    let mut kernel = echo_kernel();
    let mut channel = MemoryChannel::new();
    channel.push_request(request("Echo", "Crash", Vec::new()));

    kernel.serve(&mut channel).await.unwrap();

    match &channel.take_sent()[0] {
        Frame::Error(message) => {
            assert_eq!(message.as_slice(), b"io error: db connection lost");
        }
        other => panic!("expected an error frame, got {other:?}"),
    }
}

#[tokio::test]
async fn debug_mode_sends_the_full_diagnostic() {
    let mut kernel = Kernel::new(WorkerConfig {
        debug: true,
        ..WorkerConfig::default()
    });
    kernel.register_service(Echo).unwrap();

    let mut channel = MemoryChannel::new();
    // Malformed header envelope: parse failure has no protocol form, so it
    // takes the plain-diagnostic path.
    channel.push_request(Payload::new(Vec::new(), b"not json".to_vec()));

    kernel.serve(&mut channel).await.unwrap();

    match &channel.take_sent()[0] {
        Frame::Error(message) => {
            let text = String::from_utf8_lossy(message);
            // Debug formatting includes the variant name, not just Display.
            assert!(text.contains("Serialization"), "got: {text}");
        }
        other => panic!("expected an error frame, got {other:?}"),
    }
}

#[tokio::test]
async fn streaming_method_emits_chunks_then_stream_end() {
    let mut kernel = echo_kernel();
    let mut channel = MemoryChannel::new();
    channel.push_request(request(
        "Echo",
        "Tail",
        codec::encode(&Input {
            text: "log".to_string(),
        }),
    ));

    let mut finalize_calls = 0usize;
    kernel
        .serve_with(&mut channel, |_outcome| finalize_calls += 1)
        .await
        .unwrap();

    // Finalize runs once per stream, not once per chunk.
    assert_eq!(finalize_calls, 1);

    let sent = channel.take_sent();
    assert_eq!(sent.len(), 4);
    for (i, frame) in sent[..3].iter().enumerate() {
        match frame {
            Frame::Chunk(payload) => {
                let output: Output = codec::decode(&payload.body).unwrap();
                assert_eq!(output.text, format!("log-{i}"));
            }
            other => panic!("expected a chunk frame, got {other:?}"),
        }
    }
    assert_eq!(sent[3], Frame::StreamEnd);
}

#[tokio::test]
async fn finalize_runs_exactly_once_per_request() {
    let mut kernel = echo_kernel();
    let mut channel = MemoryChannel::new();
    channel
        .push_request(request(
            "Echo",
            "Say",
            codec::encode(&Input {
                text: "one".to_string(),
            }),
        ))
        .push_request(request("Echo", "Missing", Vec::new()))
        .push_request(request("Echo", "Fail", Vec::new()));

    let mut outcomes: Vec<bool> = Vec::new();
    kernel
        .serve_with(&mut channel, |outcome| outcomes.push(outcome.is_some()))
        .await
        .unwrap();

    assert_eq!(kernel.state(), KernelState::Stopped);
    // One finalize per request: success, then two failures.
    assert_eq!(outcomes, vec![false, true, true]);
}

#[tokio::test]
async fn closing_the_channel_returns_cleanly() {
    let mut kernel = echo_kernel();
    let mut channel = MemoryChannel::new();

    kernel.serve(&mut channel).await.unwrap();

    assert_eq!(kernel.state(), KernelState::Stopped);
    assert!(channel.sent().is_empty());
}

#[tokio::test]
async fn oversized_request_body_is_rejected_per_request() {
    let mut kernel = Kernel::new(WorkerConfig {
        max_body_bytes: 8,
        ..WorkerConfig::default()
    });
    kernel.register_service(Echo).unwrap();

    let mut channel = MemoryChannel::new();
    channel
        .push_request(request("Echo", "Say", vec![0u8; 64]))
        .push_request(request(
            "Echo",
            "Say",
            codec::encode(&Input {
                text: "ok".to_string(),
            }),
        ));

    kernel.serve(&mut channel).await.unwrap();

    let sent = channel.take_sent();
    assert_eq!(sent.len(), 2);
    match &sent[0] {
        Frame::Error(message) => {
            assert!(message.starts_with(b"13|:|"));
        }
        other => panic!("expected an error frame, got {other:?}"),
    }
    assert!(matches!(sent[1], Frame::Response(_)));
}
