//! End-to-end calls from a pooled [`Caller`] to a running server.

use std::time::Duration;

use endrpc::{
    Caller,
    ClientError,
    client::ClientConfig,
    envelope::Envelope,
    message::{Params, STATUS_NOT_FOUND},
    middleware::INTERNAL_ERROR_CODE,
};
use endrpc_testing::{TestResult, TestServer, greeter, unused_listener};
use rstest::rstest;

fn params(pairs: &[(&str, &str)]) -> Params {
    pairs
        .iter()
        .map(|(k, v)| ((*k).to_owned(), (*v).to_owned()))
        .collect()
}

fn caller() -> Caller { Caller::new(ClientConfig::default().call_timeout(Duration::from_secs(2))) }

#[rstest]
#[tokio::test]
async fn hello_world_over_tcp() -> TestResult {
    let server = TestServer::start(greeter()).await?;
    let caller = caller();

    let bytes = caller
        .call_end_api(&server.address(), "hello", "world", params(&[("name", "bob")]))
        .await?;
    assert_eq!(bytes, br#"{"success":true,"payload":"hi bob"}"#);

    server.shutdown().await;
    Ok(())
}

#[rstest]
#[tokio::test]
async fn sequential_calls_share_one_connection() -> TestResult {
    let server = TestServer::start(greeter()).await?;
    let caller = caller();
    let address = server.address();

    for name in ["ann", "bob", "cy"] {
        let bytes = caller
            .call_end_api(&address, "hello", "world", params(&[("name", name)]))
            .await?;
        let greeting: String = Envelope::decode(&bytes)?.payload_as()?;
        assert_eq!(greeting, format!("hi {name}"));
    }

    let stats = caller.pools().get_pool(&address).stats();
    assert_eq!(stats.dialed, 1);
    assert_eq!(stats.reused, 2);
    assert_eq!(stats.idle, 1);

    server.shutdown().await;
    Ok(())
}

#[rstest]
#[tokio::test]
async fn unknown_route_is_a_remote_status() -> TestResult {
    let server = TestServer::start(greeter()).await?;
    let caller = caller();
    let address = server.address();

    let err = caller
        .call_end_api(&address, "nope", "missing", Params::new())
        .await
        .expect_err("route is not registered");
    assert!(matches!(err, ClientError::Remote { code, .. } if code == STATUS_NOT_FOUND));
    assert!(!err.is_transport());

    // The connection survives the rejection and serves the next call.
    caller
        .call_end_api(&address, "hello", "world", params(&[("name", "bob")]))
        .await?;
    let stats = caller.pools().get_pool(&address).stats();
    assert_eq!((stats.dialed, stats.invalidated), (1, 0));

    server.shutdown().await;
    Ok(())
}

#[rstest]
#[tokio::test]
async fn handler_panic_becomes_error_envelope() -> TestResult {
    let server = TestServer::start(greeter()).await?;
    let caller = caller();
    let address = server.address();

    let bytes = caller
        .call_end_api(&address, "hello", "panic", Params::new())
        .await?;
    let body = Envelope::decode(&bytes)?
        .into_result()
        .expect_err("panic yields a failure envelope");
    assert_eq!(body.code, INTERNAL_ERROR_CODE);

    let bytes = caller
        .call_end_api(&address, "hello", "world", params(&[("name", "dee")]))
        .await?;
    assert_eq!(bytes, br#"{"success":true,"payload":"hi dee"}"#);

    server.shutdown().await;
    Ok(())
}

#[rstest]
#[tokio::test]
async fn stopped_server_invalidates_pooled_connection() -> TestResult {
    let server = TestServer::start(greeter()).await?;
    let caller = caller();
    let address = server.address();

    caller
        .call_end_api(&address, "hello", "world", params(&[("name", "bob")]))
        .await?;
    server.shutdown().await;

    let err = caller
        .call_end_api(&address, "hello", "world", params(&[("name", "bob")]))
        .await
        .expect_err("server is gone");
    assert!(err.is_transport());

    let stats = caller.pools().get_pool(&address).stats();
    assert_eq!(stats.idle, 0);
    assert!(stats.invalidated >= 1);
    Ok(())
}

#[rstest]
#[tokio::test]
async fn dial_failure_names_the_address() -> TestResult {
    // Bind then drop to obtain a port nothing listens on.
    let address = unused_listener()?.local_addr()?.to_string();
    let err = caller()
        .call_end_api(&address, "hello", "world", Params::new())
        .await
        .expect_err("nothing is listening");
    match err {
        ClientError::Dial { address: reported, .. } => assert_eq!(reported, address),
        other => panic!("expected dial error, got {other:?}"),
    }
    Ok(())
}

#[rstest]
#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_callers_get_their_own_replies() -> TestResult {
    let server = TestServer::start(greeter()).await?;
    let caller = caller();
    let address = server.address();

    let calls = (0..32).map(|i| {
        let caller = caller.clone();
        let address = address.clone();
        tokio::spawn(async move {
            let name = format!("user{i}");
            let bytes = caller
                .call_end_api(&address, "hello", "world", params(&[("name", name.as_str())]))
                .await?;
            let greeting: String = Envelope::decode(&bytes)
                .and_then(|e| e.payload_as())
                .map_err(|e| ClientError::Io(std::io::Error::other(e)))?;
            assert_eq!(greeting, format!("hi {name}"));
            Ok::<_, ClientError>(())
        })
    });
    for result in futures::future::join_all(calls).await {
        result??;
    }

    let stats = caller.pools().get_pool(&address).stats();
    assert_eq!(stats.returned, 32);
    assert_eq!(stats.invalidated, 0);
    assert_eq!(stats.idle as u64, stats.live);

    server.shutdown().await;
    Ok(())
}
