//! Socket transport for control messages and audio frames.

use crate::error::{BridgeError, Result};
use crate::protocol::{
    check_frame_len, decode_response, decode_samples, encode_request, ControlRequest,
    ControlResponse, NeuralControls, MESSAGE_TERMINATOR,
};
use std::path::Path;
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt, BufStream};
use tokio::net::UnixStream;

/// Message transport over a byte stream (a Unix socket in practice).
pub struct MessageTransport<S = UnixStream> {
    stream: BufStream<S>,
}

impl MessageTransport<UnixStream> {
    /// Connect to the server socket.
    pub async fn connect(socket_path: &Path) -> Result<Self> {
        let stream = UnixStream::connect(socket_path).await.map_err(|e| {
            BridgeError::ConnectionFailed(format!("{}: {e}", socket_path.display()))
        })?;
        Ok(Self::new(stream))
    }
}

impl<S: AsyncRead + AsyncWrite + Unpin> MessageTransport<S> {
    pub fn new(stream: S) -> Self {
        Self {
            stream: BufStream::new(stream),
        }
    }

    pub async fn send_request(&mut self, request: &ControlRequest) -> Result<()> {
        let data = encode_request(request)?;
        self.stream.write_all(&data).await?;
        self.stream.flush().await?;
        Ok(())
    }

    /// Read one terminated control response.
    pub async fn recv_response(&mut self) -> Result<ControlResponse> {
        let mut body = Vec::new();
        self.read_message_body(&mut body).await?;
        decode_response(&body)
    }

    async fn read_message_body(&mut self, body: &mut Vec<u8>) -> Result<()> {
        let n = self.stream.read_until(MESSAGE_TERMINATOR, body).await?;
        if n == 0 || body.last() != Some(&MESSAGE_TERMINATOR) {
            return Err(BridgeError::ConnectionFailed(
                "server closed the connection".into(),
            ));
        }
        body.pop();
        Ok(())
    }

    /// Read one audio frame.
    ///
    /// A JSON error object in place of a frame is surfaced as
    /// [`BridgeError::Remote`]. Its first byte (`{`) can never start a
    /// valid header since frame lengths are multiples of four.
    pub async fn recv_audio(&mut self) -> Result<Vec<f32>> {
        let mut header = [0u8; 4];
        self.stream.read_exact(&mut header).await?;
        if header[0] == b'{' {
            let mut body = header.to_vec();
            self.read_message_body(&mut body).await?;
            decode_response(&body)?;
            return Err(BridgeError::ProtocolError(
                "expected audio frame, got control response".into(),
            ));
        }

        let len = check_frame_len(u32::from_le_bytes(header))?;
        let mut payload = vec![0u8; len];
        self.stream.read_exact(&mut payload).await?;
        Ok(decode_samples(&payload))
    }

    /// Round-trip a control request.
    pub async fn request(&mut self, request: &ControlRequest) -> Result<ControlResponse> {
        self.send_request(request).await?;
        self.recv_response().await
    }

    pub async fn get_styles(&mut self) -> Result<Vec<String>> {
        match self.request(&ControlRequest::GetStyles).await? {
            ControlResponse::Styles { styles } => Ok(styles),
            other => Err(BridgeError::ProtocolError(format!(
                "Unexpected response to get_styles: {other:?}"
            ))),
        }
    }

    pub async fn set_controls(&mut self, controls: &NeuralControls) -> Result<()> {
        let request = ControlRequest::SetControls {
            controls: controls.clone(),
        };
        match self.request(&request).await? {
            ControlResponse::Status { status } if status == "ok" => Ok(()),
            other => Err(BridgeError::ProtocolError(format!(
                "Unexpected response to set_controls: {other:?}"
            ))),
        }
    }

    pub async fn generate(&mut self, controls: &NeuralControls, frames: u32) -> Result<Vec<f32>> {
        self.send_request(&ControlRequest::Generate {
            frames,
            controls: controls.clone(),
        })
        .await?;
        self.recv_audio().await
    }
}
