// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Synthetic photos and scripted recognizers shared by the unit tests.

use std::collections::VecDeque;
use std::io::Cursor;
use std::sync::{Condvar, Mutex};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use cardscan_core::{OcrError, RecognitionStrategy};
use image::{DynamicImage, GrayImage, ImageFormat, Rgb, RgbImage};
use imageproc::drawing::{draw_filled_circle_mut, draw_polygon_mut};
use imageproc::point::Point as PixelPoint;

use crate::ocr::TextRecognizer;

const BACKGROUND: Rgb<u8> = Rgb([30, 30, 30]);
const CARD: Rgb<u8> = Rgb([220, 220, 220]);

/// Bright quadrilaterals on a dark background.
pub fn synthetic_cards(width: u32, height: u32, cards: &[[(f32, f32); 4]]) -> RgbImage {
    let mut image = RgbImage::from_pixel(width, height, BACKGROUND);
    for corners in cards {
        let poly: Vec<PixelPoint<i32>> = corners
            .iter()
            .map(|&(x, y)| PixelPoint::new(x.round() as i32, y.round() as i32))
            .collect();
        draw_polygon_mut(&mut image, &poly, CARD);
    }
    image
}

pub fn synthetic_card(width: u32, height: u32, corners: &[(f32, f32); 4]) -> RgbImage {
    synthetic_cards(width, height, std::slice::from_ref(corners))
}

pub fn synthetic_disc(width: u32, height: u32, center: (i32, i32), radius: i32) -> RgbImage {
    let mut image = RgbImage::from_pixel(width, height, BACKGROUND);
    draw_filled_circle_mut(&mut image, center, radius, CARD);
    image
}

pub fn encode_png(image: &RgbImage) -> Vec<u8> {
    let mut buf = Vec::new();
    DynamicImage::ImageRgb8(image.clone())
        .write_to(&mut Cursor::new(&mut buf), ImageFormat::Png)
        .unwrap();
    buf
}

/// Returns the same result for every call.
pub struct FixedRecognizer {
    result: Result<String, OcrError>,
    calls: AtomicUsize,
}

impl FixedRecognizer {
    pub fn text(text: &str) -> Self {
        Self {
            result: Ok(text.to_string()),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn error(err: OcrError) -> Self {
        Self {
            result: Err(err),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl TextRecognizer for FixedRecognizer {
    fn recognize(&self, _: &GrayImage, _: &RecognitionStrategy) -> Result<String, OcrError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.result.clone()
    }
}

/// Plays back one scripted result per call, then fails.
pub struct ScriptedRecognizer {
    script: Mutex<VecDeque<Result<String, OcrError>>>,
    calls: AtomicUsize,
}

impl ScriptedRecognizer {
    pub fn new(script: Vec<Result<String, OcrError>>) -> Self {
        Self {
            script: Mutex::new(script.into()),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl TextRecognizer for ScriptedRecognizer {
    fn recognize(&self, _: &GrayImage, _: &RecognitionStrategy) -> Result<String, OcrError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.script
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Err(OcrError::Engine("script exhausted".into())))
    }
}

/// Sleeps before answering.
pub struct SlowRecognizer {
    delay: Duration,
    text: String,
}

impl SlowRecognizer {
    pub fn new(delay: Duration, text: &str) -> Self {
        Self {
            delay,
            text: text.to_string(),
        }
    }
}

impl TextRecognizer for SlowRecognizer {
    fn recognize(&self, _: &GrayImage, _: &RecognitionStrategy) -> Result<String, OcrError> {
        std::thread::sleep(self.delay);
        Ok(self.text.clone())
    }
}

/// Blocks every call until [`BlockingRecognizer::release`] is called.
pub struct BlockingRecognizer {
    released: Mutex<bool>,
    wake: Condvar,
    text: String,
    calls: AtomicUsize,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
}

impl BlockingRecognizer {
    pub fn new(text: &str) -> Self {
        Self {
            released: Mutex::new(false),
            wake: Condvar::new(),
            text: text.to_string(),
            calls: AtomicUsize::new(0),
            in_flight: AtomicUsize::new(0),
            max_in_flight: AtomicUsize::new(0),
        }
    }

    pub fn release(&self) {
        *self.released.lock().unwrap() = true;
        self.wake.notify_all();
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }
}

impl TextRecognizer for BlockingRecognizer {
    fn recognize(&self, _: &GrayImage, _: &RecognitionStrategy) -> Result<String, OcrError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);

        let mut released = self.released.lock().unwrap();
        while !*released {
            released = self.wake.wait(released).unwrap();
        }
        drop(released);

        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        Ok(self.text.clone())
    }
}
