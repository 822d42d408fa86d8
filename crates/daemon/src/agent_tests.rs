// SPDX-License-Identifier: Apache-2.0

use super::*;

#[tokio::test]
async fn bootstrap_registers_the_full_extension_surface() {
    let agent = Agent::bootstrap(Config::default(), None).await.unwrap();
    let executor = agent.executor();

    // Every extension answers something; unknown methods are 400s, not 404s.
    for name in ["clean", "deploy", "service", "system", "rescue", "poll", "fake"] {
        let err = executor
            .execute(&format!("{name}.definitely_not_a_method"), Default::default())
            .await
            .err()
            .unwrap();
        assert!(
            matches!(err, ira_core::RestError::InvalidCommand { .. }),
            "extension {name} missing: {err:?}"
        );
    }
}

#[tokio::test]
async fn bootstrap_preinjects_the_cli_token() {
    let config = Config { agent_token: Some("virtual-media".into()), ..Config::default() };
    let agent = Agent::bootstrap(config, None).await.unwrap();
    assert_eq!(agent.state().token(), Some("virtual-media"));
    // Pre-injection alone does not turn enforcement on.
    assert!(!agent.state().token_required());
}

#[tokio::test]
async fn run_without_director_or_inspection_fails() {
    let mut agent = Agent::bootstrap(Config::default(), None).await.unwrap();
    let err = agent.run().await.err().unwrap();
    assert!(matches!(err, ira_core::RestError::LookupNode { .. }));
}

#[tokio::test]
async fn inspection_only_run_is_one_shot() {
    // The collector is unreachable: inspection fails, is logged, and the
    // run still completes without a director.
    let config = Config {
        inspection_callback_url: Some("http://127.0.0.1:1/continue".into()),
        http_request_timeout: 1,
        ..Config::default()
    };
    let mut agent = Agent::bootstrap(config, None).await.unwrap();
    agent.run().await.unwrap();
}

#[tokio::test]
async fn standalone_run_serves_until_stopped() {
    let config = Config {
        standalone: true,
        listen_host: std::net::IpAddr::from([127, 0, 0, 1]),
        listen_port: 0,
        ..Config::default()
    };
    let mut agent = Agent::bootstrap(config, None).await.unwrap();
    let state = agent.state();

    let run = tokio::spawn(async move { agent.run().await });
    tokio::time::sleep(Duration::from_millis(100)).await;
    assert!(!run.is_finished());

    state.stop_serving();
    let outcome = tokio::time::timeout(Duration::from_secs(5), run)
        .await
        .expect("serve loop did not exit")
        .unwrap();
    outcome.unwrap();
}
