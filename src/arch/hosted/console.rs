//! Simulated console: bytes land in a fixed buffer instead of a UART.

use spin::Mutex;

const CONSOLE_CAP: usize = 8192;

pub(super) static CONSOLE: Mutex<ConsoleBuf> = Mutex::new(ConsoleBuf::new());

pub(super) struct ConsoleBuf {
    buf: [u8; CONSOLE_CAP],
    len: usize,
}

impl ConsoleBuf {
    const fn new() -> Self {
        Self {
            buf: [0; CONSOLE_CAP],
            len: 0,
        }
    }

    pub(super) fn push(&mut self, c: u8) {
        if self.len == CONSOLE_CAP {
            // Wrap by restarting; the console is a debugging aid.
            self.len = 0;
        }
        self.buf[self.len] = c;
        self.len += 1;
    }

    #[cfg(test)]
    pub(super) fn take(&mut self) -> std::string::String {
        let s = std::string::String::from_utf8_lossy(&self.buf[..self.len]).into_owned();
        self.len = 0;
        s
    }
}
