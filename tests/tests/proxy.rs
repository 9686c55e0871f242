// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! End-to-end smoke tests that spawn the real `agentd` and `mediator`
//! binaries against a fake key agent and drive the rendezvous socket with
//! raw client connections, covering the proxy's concrete scenarios.

use std::time::Duration;

use tokio::io::{AsyncReadExt, AsyncWriteExt};

use proxy_specs::{spawn_aborting_agent, spawn_fake_agent, ProxyProcesses};

const COOKIE: [u8; 16] = [9u8; 16];
const TIMEOUT: Duration = Duration::from_secs(10);

async fn read_some(stream: &mut tokio::net::UnixStream) -> anyhow::Result<Vec<u8>> {
    let mut buf = [0u8; 4096];
    let n = tokio::time::timeout(TIMEOUT, stream.read(&mut buf)).await??;
    Ok(buf[..n].to_vec())
}

#[tokio::test]
async fn single_round_trip() -> anyhow::Result<()> {
    let dir = tempfile::tempdir()?;
    let rendezvous = dir.path().join("rendezvous");
    spawn_fake_agent(&rendezvous, COOKIE).await?;
    let proxy = ProxyProcesses::start(&rendezvous).await?;

    let mut client = proxy.connect_client().await?;
    let greeting = read_some(&mut client).await?;
    assert_eq!(greeting, b"OK Pleased to meet you\n");

    client.write_all(b"GETINFO version\n").await?;
    let response = read_some(&mut client).await?;
    assert_eq!(response, b"D 2.4.8\nOK\n");

    Ok(())
}

#[tokio::test]
async fn inquiry_dialogue_round_trips_binary_signature() -> anyhow::Result<()> {
    let dir = tempfile::tempdir()?;
    let rendezvous = dir.path().join("rendezvous");
    spawn_fake_agent(&rendezvous, COOKIE).await?;
    let proxy = ProxyProcesses::start(&rendezvous).await?;

    let mut client = proxy.connect_client().await?;
    read_some(&mut client).await?; // greeting

    client.write_all(b"PKSIGN\n").await?;
    let inquire = read_some(&mut client).await?;
    assert_eq!(inquire, b"INQUIRE HASHVAL\n");

    client.write_all(b"D ABCDEF\nEND\n").await?;

    let mut response = Vec::new();
    while response.len() < 2 + 256 + 4 {
        response.extend(read_some(&mut client).await?);
    }
    let sig: Vec<u8> = (0u16..=0xFF).map(|b| b as u8).collect();
    let mut expected = b"D ".to_vec();
    expected.extend_from_slice(&sig);
    expected.extend_from_slice(b"\nOK\n");
    assert_eq!(response, expected);

    Ok(())
}

#[tokio::test]
async fn split_response_fires_completion_once() -> anyhow::Result<()> {
    let dir = tempfile::tempdir()?;
    let rendezvous = dir.path().join("rendezvous");
    spawn_fake_agent(&rendezvous, COOKIE).await?;
    let proxy = ProxyProcesses::start(&rendezvous).await?;

    let mut client = proxy.connect_client().await?;
    read_some(&mut client).await?; // greeting

    client.write_all(b"SPLIT\n").await?;
    let mut response = Vec::new();
    while response.len() < 3 {
        response.extend(read_some(&mut client).await?);
    }
    assert_eq!(response, b"OK\n");

    Ok(())
}

#[tokio::test]
async fn embedded_ok_in_data_line_does_not_end_response_early() -> anyhow::Result<()> {
    let dir = tempfile::tempdir()?;
    let rendezvous = dir.path().join("rendezvous");
    spawn_fake_agent(&rendezvous, COOKIE).await?;
    let proxy = ProxyProcesses::start(&rendezvous).await?;

    let mut client = proxy.connect_client().await?;
    read_some(&mut client).await?; // greeting

    client.write_all(b"EMBEDDED\n").await?;
    let response = read_some(&mut client).await?;
    assert_eq!(response, b"S STATUS: OK so far\nOK\n");

    Ok(())
}

#[tokio::test]
async fn connection_error_isolation() -> anyhow::Result<()> {
    let dir = tempfile::tempdir()?;
    let rendezvous = dir.path().join("rendezvous");
    spawn_fake_agent(&rendezvous, COOKIE).await?;
    let proxy = ProxyProcesses::start(&rendezvous).await?;

    let mut a = proxy.connect_client().await?;
    read_some(&mut a).await?; // greeting
    let mut b = proxy.connect_client().await?;
    read_some(&mut b).await?; // greeting

    // Force-close A's socket from the client side.
    drop(a);

    // B is unaffected and completes a round-trip.
    b.write_all(b"GETINFO version\n").await?;
    let response = read_some(&mut b).await?;
    assert_eq!(response, b"D 2.4.8\nOK\n");

    Ok(())
}

#[tokio::test]
async fn cookie_authentication_failure_leaves_no_session() -> anyhow::Result<()> {
    let dir = tempfile::tempdir()?;
    let rendezvous = dir.path().join("rendezvous");
    spawn_aborting_agent(&rendezvous).await?;
    let proxy = ProxyProcesses::start(&rendezvous).await?;

    let mut client = proxy.connect_client().await?;
    // The mediator observes a handshake failure and closes the client
    // socket without ever writing a greeting.
    let mut buf = [0u8; 16];
    let read = tokio::time::timeout(TIMEOUT, client.read(&mut buf)).await??;
    assert_eq!(read, 0);

    Ok(())
}
