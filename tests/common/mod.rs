#![allow(dead_code)]

use std::io::{Cursor, Read};
use std::net::SocketAddr;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use image::{DynamicImage, ImageFormat, RgbImage};
use warp::Filter;
use warp::http::StatusCode;
use zip::ZipArchive;

/// Encode a blank PNG of the given size
pub fn png(width: u32, height: u32) -> Vec<u8> {
    let mut out = Cursor::new(Vec::new());
    DynamicImage::ImageRgb8(RgbImage::new(width, height))
        .write_to(&mut out, ImageFormat::Png)
        .unwrap();
    out.into_inner()
}

/// Start a local image server on an ephemeral port.
///
/// - `/ok/<name>` serves a 120x80 PNG
/// - `/delay/<ms>/<name>` serves the same PNG after sleeping
/// - `/empty/<name>` answers 200 with no body
/// - `/broken/<name>` answers 200 with bytes that are not an image
/// - anything else is a 404
pub async fn start_image_server() -> SocketAddr {
    let ok = warp::path!("ok" / String).map(|_name: String| {
        warp::reply::with_header(png(120, 80), "content-type", "image/png")
    });

    let delayed = warp::path!("delay" / u64 / String).and_then(|ms: u64, _name: String| async move {
        tokio::time::sleep(Duration::from_millis(ms)).await;
        Ok::<_, warp::Rejection>(warp::reply::with_header(png(120, 80), "content-type", "image/png"))
    });

    let empty = warp::path!("empty" / String)
        .map(|_name: String| warp::reply::with_status(Vec::<u8>::new(), StatusCode::OK));

    let broken = warp::path!("broken" / String).map(|_name: String| b"<html>oops</html>".to_vec());

    let routes = ok.or(delayed).or(empty).or(broken);
    let (addr, server) = warp::serve(routes).bind_ephemeral(([127, 0, 0, 1], 0));
    tokio::spawn(server);
    addr
}

/// Requests currently being answered and the highest count seen
#[derive(Debug, Default)]
pub struct InFlight {
    pub current: AtomicUsize,
    pub peak: AtomicUsize,
}

/// Start a server whose every response takes `delay_ms` and which records
/// how many requests it is answering at the same time
pub async fn start_counting_server(delay_ms: u64) -> (SocketAddr, Arc<InFlight>) {
    let in_flight = Arc::new(InFlight::default());
    let state = in_flight.clone();

    let route = warp::path!("slow" / String).and_then(move |_name: String| {
        let state = state.clone();
        async move {
            let now = state.current.fetch_add(1, Ordering::SeqCst) + 1;
            state.peak.fetch_max(now, Ordering::SeqCst);
            tokio::time::sleep(Duration::from_millis(delay_ms)).await;
            state.current.fetch_sub(1, Ordering::SeqCst);
            Ok::<_, warp::Rejection>(warp::reply::with_header(png(20, 20), "content-type", "image/png"))
        }
    });

    let (addr, server) = warp::serve(route).bind_ephemeral(([127, 0, 0, 1], 0));
    tokio::spawn(server);
    (addr, in_flight)
}

/// Names of the slide parts in a presentation package
pub fn slide_parts(bytes: &[u8]) -> Vec<String> {
    let archive = ZipArchive::new(Cursor::new(bytes)).unwrap();
    let mut names: Vec<String> = archive
        .file_names()
        .filter(|name| name.starts_with("ppt/slides/slide") && name.ends_with(".xml"))
        .map(|name| name.to_string())
        .collect();
    names.sort();
    names
}

pub fn read_part(bytes: &[u8], name: &str) -> String {
    let mut archive = ZipArchive::new(Cursor::new(bytes)).unwrap();
    let mut file = archive.by_name(name).unwrap();
    let mut text = String::new();
    file.read_to_string(&mut text).unwrap();
    text
}

/// Number of pictures on slide `n` (1-based)
pub fn pictures_on_slide(bytes: &[u8], n: usize) -> usize {
    read_part(bytes, &format!("ppt/slides/slide{}.xml", n))
        .matches("<p:pic>")
        .count()
}
