use gdchat_core::error::ChatError;
use gdchat_core::message::ApiTurn;
use gdchat_core::protocol::{GenerateContentRequest, GenerationClient, GenerationParams};
use gdchat_interaction::GeminiClient;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;
use tokio::task::JoinHandle;

/// Serves one canned HTTP response and hands back the raw request.
async fn one_shot_server(status_line: &'static str, body: &'static str) -> (String, JoinHandle<String>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    let handle = tokio::spawn(async move {
        let (mut socket, _) = listener.accept().await.unwrap();
        let mut request = Vec::new();
        let mut buf = [0u8; 4096];
        // Read headers, then as much body as Content-Length announces.
        loop {
            let n = socket.read(&mut buf).await.unwrap();
            request.extend_from_slice(&buf[..n]);
            let text = String::from_utf8_lossy(&request).to_string();
            if let Some(header_end) = text.find("\r\n\r\n") {
                let content_length = text[..header_end]
                    .lines()
                    .find_map(|line| {
                        let (name, value) = line.split_once(':')?;
                        name.eq_ignore_ascii_case("content-length")
                            .then(|| value.trim().parse::<usize>().ok())
                            .flatten()
                    })
                    .unwrap_or(0);
                if request.len() >= header_end + 4 + content_length {
                    break;
                }
            }
            if n == 0 {
                break;
            }
        }

        let response = format!(
            "{status_line}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{body}",
            body.len()
        );
        socket.write_all(response.as_bytes()).await.unwrap();
        socket.shutdown().await.unwrap();
        String::from_utf8_lossy(&request).to_string()
    });

    (format!("http://{addr}/v1beta/models"), handle)
}

fn request() -> GenerateContentRequest {
    let params = GenerationParams {
        temperature: 0.7,
        top_k: 40,
        top_p: 0.95,
        max_output_tokens: 2048,
    };
    GenerateContentRequest::new(&[ApiTurn::user("Oi")], params, "BLOCK_MEDIUM_AND_ABOVE")
}

#[tokio::test]
async fn test_generate_posts_wire_format_and_parses_reply() {
    let (base_url, server) = one_shot_server(
        "HTTP/1.1 200 OK",
        r#"{"candidates":[{"content":{"parts":[{"text":"Olá!"}]},"finishReason":"STOP"}]}"#,
    )
    .await;
    let client = GeminiClient::new("test-key").with_base_url(base_url);

    let response = client.generate("gemini-2.5-flash", &request()).await.unwrap();
    assert_eq!(response.text().as_deref(), Some("Olá!"));
    assert!(!response.is_truncated());

    let raw = server.await.unwrap();
    assert!(raw.starts_with("POST /v1beta/models/gemini-2.5-flash:generateContent?key=test-key"));
    assert!(raw.contains(r#""generationConfig":{"temperature":0.7,"topK":40,"topP":0.95,"maxOutputTokens":2048}"#));
    assert!(raw.contains(r#""contents":[{"role":"user","parts":[{"text":"Oi"}]}]"#));
    assert!(raw.contains(r#""safetySettings":[{"category":"HARM_CATEGORY_HARASSMENT""#));
}

#[tokio::test]
async fn test_generate_maps_error_status() {
    let (base_url, _server) = one_shot_server(
        "HTTP/1.1 403 Forbidden",
        r#"{"error":{"code":403,"message":"API key not valid","status":"PERMISSION_DENIED"}}"#,
    )
    .await;
    let client = GeminiClient::new("bad-key").with_base_url(base_url);

    let err = client.generate("gemini-2.5-flash", &request()).await.unwrap_err();
    assert_eq!(
        err,
        ChatError::api(Some(403), "PERMISSION_DENIED: API key not valid")
    );
    assert!(!err.to_string().contains("bad-key"));
}

#[tokio::test]
async fn test_unreachable_endpoint_is_transport_error_without_key() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let client = GeminiClient::new("hidden-key").with_base_url(format!("http://{addr}/models"));
    let err = client.generate("gemini-2.5-flash", &request()).await.unwrap_err();
    assert!(matches!(err, ChatError::Transport(_)));
    assert!(!err.to_string().contains("hidden-key"));
}
