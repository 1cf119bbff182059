use {
    crate::{BoundingBox, RelayError},
    com::ControlServer,
    serde::Serialize,
    std::{future::Future, sync::Arc},
};

/// Round an angle to two decimal places.
pub fn round_angle(angle: f32) -> f32 {
    (angle * 100.0).round() / 100.0
}

/// Turns detections into a steering signal for the downstream controller.
pub trait DirectionMapper: Send + Sync + 'static {
    /// Direction of an object spanning `left_x..right_x` in a frame
    /// `frame_width` pixels wide.
    fn angle(&self, left_x: f32, right_x: f32, frame_width: u32) -> f32;

    /// Emit a control message for `boxes`; the first box is the target.
    fn send(
        &self,
        boxes: &[BoundingBox],
        frame_width: u32,
    ) -> impl Future<Output = Result<(), RelayError>> + Send;

    /// Resolve once the controller side can receive messages.
    fn ready(&self) -> impl Future<Output = Result<(), RelayError>> + Send {
        async { Ok(()) }
    }
}

/// Linear mapping of the horizontal box center onto the camera's field of
/// view: left edge is `-fov / 2`, center is 0, right edge is `+fov / 2`.
pub fn fov_angle(left_x: f32, right_x: f32, frame_width: u32, horizontal_fov: f32) -> f32 {
    if frame_width == 0 {
        return 0.0;
    }
    let center = (left_x + right_x) / 2.0;
    (center / frame_width as f32 - 0.5) * horizontal_fov
}

#[derive(Debug, Serialize)]
pub struct ControlMessage<'a> {
    pub angle: f32,
    pub frame_width: u32,
    pub boxes: &'a [BoundingBox],
}

/// Sends direction messages as JSON text over the control WebSocket.
pub struct ControlDirection {
    server: Arc<ControlServer>,
    horizontal_fov: f32,
}

impl ControlDirection {
    pub fn new(server: Arc<ControlServer>, horizontal_fov: f32) -> Self {
        Self {
            server,
            horizontal_fov,
        }
    }
}

impl DirectionMapper for ControlDirection {
    fn angle(&self, left_x: f32, right_x: f32, frame_width: u32) -> f32 {
        fov_angle(left_x, right_x, frame_width, self.horizontal_fov)
    }

    async fn send(&self, boxes: &[BoundingBox], frame_width: u32) -> Result<(), RelayError> {
        let Some(target) = boxes.first() else {
            return Ok(());
        };
        let message = ControlMessage {
            angle: round_angle(self.angle(target.x1, target.x2, frame_width)),
            frame_width,
            boxes,
        };
        let reached = self.server.send_json(&message).await?;
        if reached == 0 {
            log::debug!("no controller connected, direction dropped");
        }
        Ok(())
    }

    async fn ready(&self) -> Result<(), RelayError> {
        Ok(self.server.wait_for_client().await?)
    }
}
