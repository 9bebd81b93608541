// Copyright (c) The nextest Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

use std::{
    io,
    sync::{Arc, Mutex},
};

/// Log output captured from a `tracing` subscriber.
#[derive(Clone, Default)]
pub(crate) struct CapturedOutput(Arc<Mutex<Vec<u8>>>);

impl CapturedOutput {
    pub(crate) fn contents(&self) -> String {
        String::from_utf8(self.0.lock().unwrap().clone()).unwrap()
    }
}

impl io::Write for CapturedOutput {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.lock().unwrap().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

/// Runs `f` with a subscriber installed for the current thread, returning its result and the
/// formatted log lines.
pub(crate) fn capture_logs<T>(f: impl FnOnce() -> T) -> (T, String) {
    let output = CapturedOutput::default();
    let subscriber = {
        let output = output.clone();
        tracing_subscriber::fmt()
            .with_writer(move || output.clone())
            .without_time()
            .with_target(false)
            .finish()
    };

    let result = tracing::subscriber::with_default(subscriber, f);
    (result, output.contents())
}
