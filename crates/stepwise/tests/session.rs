#![cfg(unix)]

use serde_json::json;
use stepwise::core::{Reply, Stage, Step};
use stepwise::{Profile, SessionBuilder};
use stepwise_model::ModelMessage;
use stepwise_test_model::TestModelProvider;
use tempfile::TempDir;

#[tokio::test]
async fn test_list_files() {
    let root = TempDir::new().unwrap();
    std::fs::write(root.path().join("a.txt"), "").unwrap();
    std::fs::write(root.path().join("b.txt"), "").unwrap();

    let mut model_provider = TestModelProvider::default();
    model_provider.add_text_response(
        json!({
            "step": "action",
            "function": "execute_shell_command",
            "input": "ls"
        })
        .to_string(),
    );
    model_provider.add_text_response(
        json!({ "step": "result", "content": "a.txt and b.txt" }).to_string(),
    );

    let mut session = SessionBuilder::with_model_provider(model_provider.clone())
        .with_profile(Profile::Terminal)
        .with_project_dir(root.path())
        .build();

    let reply = session.submit("list files").await.unwrap();
    assert_eq!(reply, Reply::Result("a.txt and b.txt".to_owned()));
    assert_eq!(session.stage(), Stage::AwaitingUserInput);

    let requests = model_provider.requests();
    assert_eq!(requests.len(), 2);
    let Some(ModelMessage::Model(observation)) = requests[1].messages.last()
    else {
        panic!("expected an observation");
    };
    assert_eq!(
        Step::parse(observation).unwrap(),
        Step::observation("a.txt\nb.txt")
    );

    assert_eq!(session.submit("exit").await.unwrap(), Reply::Exit);
    assert_eq!(session.stage(), Stage::Ended);
    assert_eq!(model_provider.requests().len(), 2);
}
