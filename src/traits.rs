use anyhow::Result;

/// Bidirectional text channel to the amplifier.
#[cfg_attr(test, mockall::automock)]
pub trait Transport {
    /// Establish the connection. An error counts as an abnormal close.
    fn open(&mut self) -> Result<()>;

    fn send_text(&mut self, text: &str) -> Result<()>;

    /// Receive one message. Returns Ok(None) if nothing is pending.
    /// An error means the connection is gone.
    fn recv_text(&mut self) -> Result<Option<String>>;

    /// Close deliberately. Default impl does nothing.
    fn close(&mut self) {}
}

/// Source of the fair coin used to hide X.
#[cfg_attr(test, mockall::automock)]
pub trait RandomSource {
    fn coin_flip(&mut self) -> bool;
}

impl<T: Transport + ?Sized> Transport for Box<T> {
    fn open(&mut self) -> Result<()> {
        (**self).open()
    }

    fn send_text(&mut self, text: &str) -> Result<()> {
        (**self).send_text(text)
    }

    fn recv_text(&mut self) -> Result<Option<String>> {
        (**self).recv_text()
    }

    fn close(&mut self) {
        (**self).close()
    }
}
