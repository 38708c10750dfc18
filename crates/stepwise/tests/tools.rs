use serde_json::{Value, json};
use stepwise::tools::*;
use stepwise_core::tool::Registry;
use tempfile::TempDir;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;

fn registry(root: &TempDir) -> Registry {
    let mut registry = Registry::default();
    registry.register(ExecuteCommandTool::new(root.path()));
    registry.register(ExecuteShellCommandTool::new(root.path()));
    registry.register(CreateProjectStructureTool::new(root.path()));
    registry.register(WriteCodeToFileTool::new(root.path()));
    registry.register(ReadFileTool::new(root.path()));
    registry.register(GetWeatherTool::with_base_url("http://127.0.0.1:9"));
    registry
}

#[tokio::test]
async fn test_malformed_input_is_reported() {
    let root = TempDir::new().unwrap();
    let registry = registry(&root);
    assert_eq!(registry.len(), 6);

    let malformed: [Value; 3] = [json!(42), json!([1, 2]), json!(null)];
    for tool in registry.list() {
        for input in &malformed {
            let output = registry.invoke(&tool.name, input.clone()).await;
            assert!(
                output.starts_with("Error: Invalid input"),
                "{}({input}): {output}",
                tool.name
            );
        }
    }

    for name in ["create_project_structure", "write_code_to_file", "read_file"]
    {
        let output = registry.invoke(name, json!("{\"path\": ")).await;
        assert!(output.starts_with("Error: Invalid input"), "{output}");
    }
    // Nothing was created by the rejected calls.
    assert_eq!(std::fs::read_dir(root.path()).unwrap().count(), 0);
}

#[tokio::test]
async fn test_json_encoded_input() {
    let root = TempDir::new().unwrap();
    let registry = registry(&root);

    let input = json!({ "path": "hello.py", "code": "print('hello')" });
    let output = registry
        .invoke("write_code_to_file", Value::String(input.to_string()))
        .await;
    assert_eq!(output, "Code written to hello.py");

    let output = registry
        .invoke("read_file", json!("{\"path\": \"hello.py\"}"))
        .await;
    assert_eq!(output, "print('hello')");
    let again = registry.invoke("read_file", json!({ "path": "hello.py" })).await;
    assert_eq!(output, again);
}

async fn serve_once(listener: TcpListener, response: &'static str) {
    let (mut stream, _) = listener.accept().await.unwrap();
    let mut buf = [0u8; 4096];
    let _ = stream.read(&mut buf).await.unwrap();
    stream.write_all(response.as_bytes()).await.unwrap();
    stream.shutdown().await.ok();
}

#[tokio::test]
async fn test_weather_service_error() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let server = tokio::spawn(serve_once(
        listener,
        "HTTP/1.1 503 Service Unavailable\r\n\
         Content-Length: 0\r\nConnection: close\r\n\r\n",
    ));

    let tool = GetWeatherTool::with_base_url(format!("http://{addr}"));
    let mut registry = Registry::default();
    registry.register(tool);
    let output = registry.invoke("get_weather", json!("Paris")).await;
    assert_eq!(output, "Failed to get weather data: 503");
    server.await.unwrap();
}

#[tokio::test]
async fn test_weather_service_success() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let server = tokio::spawn(serve_once(
        listener,
        "HTTP/1.1 200 OK\r\nContent-Type: text/plain\r\n\
         Content-Length: 16\r\nConnection: close\r\n\r\nPartly cloudy +9",
    ));

    let mut registry = Registry::default();
    registry.register(GetWeatherTool::with_base_url(format!("http://{addr}")));
    let output = registry.invoke("get_weather", json!("New York")).await;
    assert_eq!(output, "The current weather in New York is Partly cloudy +9");
    server.await.unwrap();
}

#[tokio::test]
async fn test_weather_service_unreachable() {
    // Bind and drop to find a port nobody listens on.
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let mut registry = Registry::default();
    registry.register(GetWeatherTool::with_base_url(format!("http://{addr}")));
    let output = registry.invoke("get_weather", json!("Paris")).await;
    assert!(
        output.starts_with("Failed to get weather data: "),
        "{output}"
    );
}
