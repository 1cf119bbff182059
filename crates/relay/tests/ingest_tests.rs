use base::Vec2;
use com::{ViewerRegistry, WsClient};
use image::PixelFormat;
use relay::{
    CameraIngest, CameraPolicy, RelayConfig, ResetEvents, ResetReason, SharedFrameBuffer,
    ViewerIngest, reset_channel,
};
use std::sync::Arc;
use tokio::time::{Duration, sleep, timeout};

fn local_config() -> RelayConfig {
    RelayConfig::default()
        .with_camera_addr("127.0.0.1:0")
        .with_viewer_addr("127.0.0.1:0")
        .with_control_addr("127.0.0.1:0")
}

async fn next_reset(events: &mut ResetEvents) -> ResetReason {
    timeout(Duration::from_secs(5), events.next())
        .await
        .expect("reset timed out")
        .expect("reset channel closed")
}

async fn wait_for_raw(buffer: &SharedFrameBuffer) -> image::Image {
    for _ in 0..500 {
        if let Some(frame) = buffer.get_raw() {
            return frame;
        }
        sleep(Duration::from_millis(10)).await;
    }
    panic!("no frame arrived");
}

#[tokio::test]
async fn test_camera_rgb_frame_lands_in_buffer() {
    let buffer = Arc::new(SharedFrameBuffer::new());
    let (signal, mut events) = reset_channel();
    let ingest = CameraIngest::start(&local_config(), Arc::clone(&buffer), signal)
        .await
        .expect("start failed");

    let mut camera = WsClient::connect(ingest.local_addr())
        .await
        .expect("connect failed");
    assert_eq!(next_reset(&mut events).await, ResetReason::CameraConnected);

    camera
        .send_binary(vec![0u8; 640 * 480 * 3])
        .await
        .expect("send failed");

    let frame = wait_for_raw(&buffer).await;
    assert_eq!(frame.size, Vec2::new(640, 480));
    assert_eq!(frame.format, PixelFormat::Rgb8);
    assert!(frame.data.iter().all(|b| *b == 0));
    assert_eq!(ingest.received_frames(), 1);
    assert_eq!(ingest.active_cameras(), 1);

    camera.close().await.expect("close failed");
    assert_eq!(next_reset(&mut events).await, ResetReason::CameraDisconnected);
    sleep(Duration::from_millis(100)).await;
    assert_eq!(ingest.active_cameras(), 0);
    assert_eq!(events.try_next(), None);
}

#[tokio::test]
async fn test_camera_dropped_mid_stream_resets_once() {
    let buffer = Arc::new(SharedFrameBuffer::new());
    let (signal, mut events) = reset_channel();
    let ingest = CameraIngest::start(&local_config(), Arc::clone(&buffer), signal)
        .await
        .expect("start failed");

    let mut camera = WsClient::connect(ingest.local_addr())
        .await
        .expect("connect failed");
    assert_eq!(next_reset(&mut events).await, ResetReason::CameraConnected);
    camera
        .send_binary(vec![0u8; 640 * 480 * 3])
        .await
        .expect("send failed");
    wait_for_raw(&buffer).await;

    // connection goes away without a close frame
    drop(camera);
    assert_eq!(next_reset(&mut events).await, ResetReason::CameraDisconnected);
    sleep(Duration::from_millis(200)).await;
    assert_eq!(events.try_next(), None);
    assert_eq!(ingest.active_cameras(), 0);
}

#[tokio::test]
async fn test_dropping_camera_ingest_stops_handlers() {
    let buffer = Arc::new(SharedFrameBuffer::new());
    let (signal, mut events) = reset_channel();
    let ingest = CameraIngest::start(&local_config(), Arc::clone(&buffer), signal)
        .await
        .expect("start failed");

    let mut camera = WsClient::connect(ingest.local_addr())
        .await
        .expect("connect failed");
    assert_eq!(next_reset(&mut events).await, ResetReason::CameraConnected);

    drop(ingest);

    // every reset sender lived in the accept loop or a handler
    let closed = timeout(Duration::from_secs(5), events.next())
        .await
        .expect("handlers still running");
    assert_eq!(closed, None);

    let recv = timeout(Duration::from_secs(5), camera.recv())
        .await
        .expect("camera connection still open");
    assert!(recv.is_err());

    let _ = camera.send_binary(vec![0u8; 640 * 480 * 3]).await;
    sleep(Duration::from_millis(100)).await;
    assert!(buffer.get_raw().is_none());
}

#[tokio::test]
async fn test_camera_rgba_and_jpeg_frames_become_rgb() {
    let buffer = Arc::new(SharedFrameBuffer::new());
    let (signal, _events) = reset_channel();
    let config = local_config().with_width(64).with_height(48);
    let ingest = CameraIngest::start(&config, Arc::clone(&buffer), signal)
        .await
        .expect("start failed");
    let mut camera = WsClient::connect(ingest.local_addr())
        .await
        .expect("connect failed");

    camera
        .send_binary(vec![255u8; 64 * 48 * 4])
        .await
        .expect("send failed");
    let frame = wait_for_raw(&buffer).await;
    assert_eq!(frame.format, PixelFormat::Rgb8);
    assert_eq!(frame.data.len(), 64 * 48 * 3);

    // a JPEG of a different size is scaled to the configured size
    let jpeg = image::rgb_to_jpeg(Vec2::new(32, 24), &vec![128u8; 32 * 24 * 3], 80)
        .expect("encode failed");
    camera.send_binary(jpeg).await.expect("send failed");
    for _ in 0..500 {
        if ingest.received_frames() == 2 {
            break;
        }
        sleep(Duration::from_millis(10)).await;
    }
    assert_eq!(ingest.received_frames(), 2);
    let frame = buffer.get_raw().expect("no frame");
    assert_eq!(frame.size, Vec2::new(64, 48));
    assert_eq!(frame.format, PixelFormat::Rgb8);
}

#[tokio::test]
async fn test_camera_malformed_payload_is_dropped() {
    let buffer = Arc::new(SharedFrameBuffer::new());
    let (signal, _events) = reset_channel();
    let ingest = CameraIngest::start(&local_config(), Arc::clone(&buffer), signal)
        .await
        .expect("start failed");
    let mut camera = WsClient::connect(ingest.local_addr())
        .await
        .expect("connect failed");

    camera.send_binary(vec![1u8; 100]).await.expect("send failed");
    camera.send_text("hello".to_string()).await.expect("send failed");
    for _ in 0..500 {
        if ingest.dropped_frames() == 1 {
            break;
        }
        sleep(Duration::from_millis(10)).await;
    }
    assert_eq!(ingest.dropped_frames(), 1);
    assert_eq!(ingest.received_frames(), 0);
    assert!(buffer.get_raw().is_none());

    // the connection survives a bad payload
    camera
        .send_binary(vec![0u8; 640 * 480 * 3])
        .await
        .expect("send failed");
    wait_for_raw(&buffer).await;
}

#[tokio::test]
async fn test_exclusive_policy_rejects_second_camera() {
    let buffer = Arc::new(SharedFrameBuffer::new());
    let (signal, mut events) = reset_channel();
    let config = local_config().with_camera_policy(CameraPolicy::Exclusive);
    let ingest = CameraIngest::start(&config, Arc::clone(&buffer), signal)
        .await
        .expect("start failed");

    let _first = WsClient::connect(ingest.local_addr())
        .await
        .expect("connect failed");
    assert_eq!(next_reset(&mut events).await, ResetReason::CameraConnected);

    let mut second = WsClient::connect(ingest.local_addr())
        .await
        .expect("connect failed");
    let closed = timeout(Duration::from_secs(5), second.recv())
        .await
        .expect("second camera was not closed");
    assert!(closed.is_err());

    // no reset for a rejected camera
    assert!(
        timeout(Duration::from_millis(100), events.next())
            .await
            .is_err()
    );
    assert_eq!(ingest.active_cameras(), 1);
}

#[tokio::test]
async fn test_shared_policy_accepts_every_camera() {
    let buffer = Arc::new(SharedFrameBuffer::new());
    let (signal, mut events) = reset_channel();
    let ingest = CameraIngest::start(&local_config(), Arc::clone(&buffer), signal)
        .await
        .expect("start failed");

    let _first = WsClient::connect(ingest.local_addr()).await.expect("connect failed");
    let _second = WsClient::connect(ingest.local_addr()).await.expect("connect failed");
    assert_eq!(next_reset(&mut events).await, ResetReason::CameraConnected);
    assert_eq!(next_reset(&mut events).await, ResetReason::CameraConnected);
    assert_eq!(ingest.active_cameras(), 2);
}

async fn wait_for_viewers(ingest: &ViewerIngest, count: usize) {
    for _ in 0..500 {
        if ingest.viewer_count().await == count {
            return;
        }
        sleep(Duration::from_millis(10)).await;
    }
    panic!("expected {count} viewers, have {}", ingest.viewer_count().await);
}

#[tokio::test]
async fn test_viewer_disconnect_leaves_others_served() {
    let registry = Arc::new(ViewerRegistry::new(Duration::from_secs(1)));
    let (signal, mut events) = reset_channel();
    let ingest = ViewerIngest::start(&local_config(), Arc::clone(&registry), signal)
        .await
        .expect("start failed");

    let first = WsClient::connect(ingest.local_addr()).await.expect("connect failed");
    let mut second = WsClient::connect(ingest.local_addr()).await.expect("connect failed");
    wait_for_viewers(&ingest, 2).await;
    assert_eq!(next_reset(&mut events).await, ResetReason::ViewerConnected);
    assert_eq!(next_reset(&mut events).await, ResetReason::ViewerConnected);

    first.close().await.expect("close failed");
    wait_for_viewers(&ingest, 1).await;
    assert_eq!(next_reset(&mut events).await, ResetReason::ViewerDisconnected);
    sleep(Duration::from_millis(100)).await;
    assert_eq!(events.try_next(), None);

    let report = registry.broadcast(vec![0xFF, 0xD8, 0xFF, 0x00]).await;
    assert_eq!(report.delivered, 1);
    assert_eq!(report.removed, 0);

    let got = timeout(Duration::from_secs(5), second.recv())
        .await
        .expect("recv timed out")
        .expect("recv failed");
    assert_eq!(got, vec![0xFF, 0xD8, 0xFF, 0x00]);
}

#[tokio::test]
async fn test_viewer_removed_by_broadcast_resets_once() {
    let registry = Arc::new(ViewerRegistry::new(Duration::from_millis(50)));
    let (signal, mut events) = reset_channel();
    let ingest = ViewerIngest::start(&local_config(), Arc::clone(&registry), signal)
        .await
        .expect("start failed");

    // never reads, so its socket buffers fill and sends start timing out
    let stalled = WsClient::connect(ingest.local_addr()).await.expect("connect failed");
    wait_for_viewers(&ingest, 1).await;
    assert_eq!(next_reset(&mut events).await, ResetReason::ViewerConnected);

    let mut removed = 0;
    for _ in 0..100 {
        removed += registry.broadcast(vec![0xAB; 8 * 1024 * 1024]).await.removed;
        if removed > 0 {
            break;
        }
    }
    assert_eq!(removed, 1);
    assert_eq!(ingest.viewer_count().await, 0);
    // the handler is still reading, so nothing has been fired yet
    assert_eq!(events.try_next(), None);

    drop(stalled);
    assert_eq!(next_reset(&mut events).await, ResetReason::ViewerDisconnected);
    sleep(Duration::from_millis(200)).await;
    assert_eq!(events.try_next(), None);
    assert_eq!(ingest.viewer_count().await, 0);
}

#[tokio::test]
async fn test_dropping_viewer_ingest_stops_handlers() {
    let registry = Arc::new(ViewerRegistry::new(Duration::from_secs(1)));
    let (signal, mut events) = reset_channel();
    let ingest = ViewerIngest::start(&local_config(), Arc::clone(&registry), signal)
        .await
        .expect("start failed");

    let _viewer = WsClient::connect(ingest.local_addr()).await.expect("connect failed");
    wait_for_viewers(&ingest, 1).await;
    assert_eq!(next_reset(&mut events).await, ResetReason::ViewerConnected);

    drop(ingest);
    let closed = timeout(Duration::from_secs(5), events.next())
        .await
        .expect("handlers still running");
    assert_eq!(closed, None);
}
