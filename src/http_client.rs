//! One ureq agent for remote sound files and Freesound API calls.

use std::io::{self, Read};
use std::sync::OnceLock;
use std::time::Duration;

const USER_AGENT: &str = concat!("harmoni/", env!("CARGO_PKG_VERSION"));

pub(crate) fn agent() -> &'static ureq::Agent {
    static AGENT: OnceLock<ureq::Agent> = OnceLock::new();
    AGENT.get_or_init(|| {
        ureq::AgentBuilder::new()
            .user_agent(USER_AGENT)
            .timeout_connect(Duration::from_secs(10))
            .timeout_read(Duration::from_secs(30))
            .build()
    })
}

/// `HTTP <code> <reason>` for status failures, the transport message otherwise.
pub(crate) fn describe_error(err: &ureq::Error) -> String {
    match err {
        ureq::Error::Status(code, response) => format!("HTTP {code} {}", response.status_text()),
        ureq::Error::Transport(transport) => transport.to_string(),
    }
}

/// Buffer a response body, failing once it would exceed `limit` bytes.
///
/// An announced `Content-Length` above the limit fails before any read.
pub(crate) fn read_response_bytes(response: ureq::Response, limit: usize) -> io::Result<Vec<u8>> {
    let too_large = |size: u64| {
        io::Error::new(
            io::ErrorKind::InvalidData,
            format!("Response of {size} bytes exceeds the {limit} byte limit"),
        )
    };
    if let Some(announced) = response
        .header("Content-Length")
        .and_then(|value| value.parse::<u64>().ok())
        && announced > limit as u64
    {
        return Err(too_large(announced));
    }
    let mut body = Vec::new();
    response
        .into_reader()
        .take(limit as u64 + 1)
        .read_to_end(&mut body)?;
    if body.len() > limit {
        return Err(too_large(body.len() as u64));
    }
    Ok(body)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use std::net::TcpListener;
    use std::thread;

    fn reply_with(raw: String) -> String {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let url = format!("http://{}/rain.mp3", listener.local_addr().unwrap());
        thread::spawn(move || {
            if let Ok((mut stream, _)) = listener.accept() {
                let mut request = [0u8; 1024];
                let _ = stream.read(&mut request);
                let _ = stream.write_all(raw.as_bytes());
            }
        });
        url
    }

    #[test]
    fn small_sound_file_is_buffered() {
        let url = reply_with("HTTP/1.1 200 OK\r\nContent-Length: 4\r\n\r\nID3\x04".into());
        let response = agent().get(&url).call().unwrap();
        assert_eq!(read_response_bytes(response, 16).unwrap(), b"ID3\x04");
    }

    #[test]
    fn oversized_downloads_are_refused() {
        let announced = reply_with("HTTP/1.1 200 OK\r\nContent-Length: 100\r\n\r\nok".into());
        let response = agent().get(&announced).call().unwrap();
        let err = read_response_bytes(response, 10).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::InvalidData);

        let streamed = reply_with(format!("HTTP/1.0 200 OK\r\n\r\n{}", "a".repeat(32)));
        let response = agent().get(&streamed).call().unwrap();
        let err = read_response_bytes(response, 16).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::InvalidData);
    }

    #[test]
    fn missing_sound_reports_status() {
        let url = reply_with("HTTP/1.1 404 Not Found\r\nContent-Length: 0\r\n\r\n".into());
        let err = agent().get(&url).call().unwrap_err();
        assert_eq!(describe_error(&err), "HTTP 404 Not Found");
    }
}
