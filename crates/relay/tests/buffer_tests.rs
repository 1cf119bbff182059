use base::Vec2;
use image::{Image, PixelFormat};
use relay::SharedFrameBuffer;
use std::sync::Arc;
use tokio::time::{Duration, Instant, sleep};

fn frame(value: u8) -> Image {
    Image::new(Vec2::new(2, 2), vec![value; 12], PixelFormat::Rgb8)
}

#[test]
fn test_empty_buffer_has_nothing() {
    let buffer = SharedFrameBuffer::new();
    assert!(buffer.get_raw().is_none());
    assert!(buffer.get_annotated().is_none());
    assert!(buffer.get_latest().is_none());
    assert!(buffer.take_raw().is_none());
}

#[test]
fn test_put_overwrites_unread_frame() {
    let buffer = SharedFrameBuffer::new();
    buffer.put_raw(frame(1));
    buffer.put_raw(frame(2));
    assert_eq!(buffer.get_raw(), Some(frame(2)));
}

#[test]
fn test_take_consumes_availability_but_not_frame() {
    let buffer = SharedFrameBuffer::new();
    buffer.put_raw(frame(7));

    assert_eq!(buffer.take_raw(), Some(frame(7)));
    assert!(buffer.take_raw().is_none());
    // the frame itself stays for plain reads
    assert_eq!(buffer.get_raw(), Some(frame(7)));

    buffer.put_raw(frame(8));
    assert_eq!(buffer.take_raw(), Some(frame(8)));
}

#[test]
fn test_latest_prefers_annotated() {
    let buffer = SharedFrameBuffer::new();
    buffer.put_raw(frame(1));
    assert_eq!(buffer.get_latest(), Some(frame(1)));

    buffer.put_annotated(frame(9));
    assert_eq!(buffer.get_latest(), Some(frame(9)));

    // a newer raw frame does not hide the annotated one
    buffer.put_raw(frame(2));
    assert_eq!(buffer.get_latest(), Some(frame(9)));
}

#[test]
fn test_reads_are_copies() {
    let buffer = SharedFrameBuffer::new();
    buffer.put_raw(frame(3));
    let mut copy = buffer.get_raw().unwrap();
    copy.data.fill(0);
    assert_eq!(buffer.get_raw(), Some(frame(3)));
}

#[tokio::test]
async fn test_next_raw_times_out_when_idle() {
    let buffer = SharedFrameBuffer::new();
    let start = Instant::now();
    assert!(buffer.next_raw(Duration::from_millis(30)).await.is_none());
    assert!(start.elapsed() >= Duration::from_millis(25));
}

#[tokio::test]
async fn test_next_raw_wakes_on_put() {
    let buffer = Arc::new(SharedFrameBuffer::new());
    let writer = {
        let buffer = Arc::clone(&buffer);
        tokio::spawn(async move {
            sleep(Duration::from_millis(20)).await;
            buffer.put_raw(frame(5));
        })
    };

    let got = buffer.next_raw(Duration::from_secs(5)).await;
    assert_eq!(got, Some(frame(5)));
    writer.await.unwrap();
}

#[tokio::test]
async fn test_concurrent_writers_leave_one_whole_frame() {
    let buffer = Arc::new(SharedFrameBuffer::new());
    let mut writers = Vec::new();
    for value in 1..=8u8 {
        let buffer = Arc::clone(&buffer);
        writers.push(tokio::spawn(async move {
            for _ in 0..50 {
                buffer.put_raw(frame(value));
                tokio::task::yield_now().await;
            }
        }));
    }
    for writer in writers {
        writer.await.unwrap();
    }

    let last = buffer.get_raw().unwrap();
    assert_eq!(last.data.len(), 12);
    // never a mix of two writers
    assert!(last.data.iter().all(|b| *b == last.data[0]));
}
