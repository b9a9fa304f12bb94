//! MindScan: a guided depression self-screening session.
//!
//! A session walks a user through device setup, a short spoken interview
//! and the PHQ-8 questionnaire while a facial-expression sampler runs in
//! the background, then sends the three signals to a scoring service.
//!
//! Platform capabilities (camera, microphone, expression detector, speech
//! recognition and synthesis) sit behind traits so hosts without one of
//! them still get a complete session.

pub mod config;
pub mod expression;
pub mod scoring;
pub mod sensor;
pub mod session;
pub mod speech;
