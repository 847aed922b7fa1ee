//! Dimension probes for remote and local images.

use super::{Dimensions, ImageError};
use std::{io::Cursor, path::Path, time::Duration};
use ureq::Agent;

/// Shared HTTP agent. Non-2xx responses are returned, not raised.
pub fn agent(timeout: Duration) -> Agent {
    Agent::config_builder()
        .timeout_global(Some(timeout))
        .http_status_as_error(false)
        .build()
        .into()
}

/// GET `url` and decode the dimensions of the body. Blocking.
pub fn remote_dimensions(agent: &Agent, url: &str) -> Result<Dimensions, ImageError> {
    let response = agent
        .get(url)
        .call()
        .map_err(|err| ImageError::Http(url.to_owned(), err.to_string()))?;

    let status = response.status();
    if !status.is_success() {
        return Err(ImageError::Status(url.to_owned(), status.as_u16()));
    }

    let bytes = response
        .into_body()
        .read_to_vec()
        .map_err(|err| ImageError::Http(url.to_owned(), err.to_string()))?;
    decode_dimensions(url, &bytes)
}

/// Read the header of an in-memory image.
pub fn decode_dimensions(src: &str, bytes: &[u8]) -> Result<Dimensions, ImageError> {
    let decode = |err: image::ImageError| ImageError::Decode(src.to_owned(), err.to_string());
    let (width, height) = image::ImageReader::new(Cursor::new(bytes))
        .with_guessed_format()
        .map_err(|err| ImageError::Decode(src.to_owned(), err.to_string()))?
        .into_dimensions()
        .map_err(decode)?;
    Ok(Dimensions::new(width, height))
}

/// Read the header of an image file. Blocking.
pub fn local_dimensions(src: &str, path: &Path) -> Result<Dimensions, ImageError> {
    if !path.is_file() {
        return Err(ImageError::NotFound(src.to_owned()));
    }
    let (width, height) = image::image_dimensions(path)
        .map_err(|err| ImageError::Decode(src.to_owned(), err.to_string()))?;
    Ok(Dimensions::new(width, height))
}
