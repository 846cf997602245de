use std::io::{self, IoSlice, Read, Write};

/// A byte stream that moves whole buffers or fails.
///
/// Both methods report how many bytes they transferred. Anything short of
/// the full request is a broken transport; [`MessageChannel`](crate::MessageChannel)
/// turns it into an error instead of retrying.
pub trait Transport {
    /// Writes all of `bufs`, in order, as one logical write.
    fn write_exact(&mut self, bufs: &[IoSlice<'_>]) -> io::Result<usize>;

    /// Fills the whole of `buf`.
    fn read_exact(&mut self, buf: &mut [u8]) -> io::Result<usize>;
}

impl<T: Transport + ?Sized> Transport for &mut T {
    fn write_exact(&mut self, bufs: &[IoSlice<'_>]) -> io::Result<usize> {
        (**self).write_exact(bufs)
    }

    fn read_exact(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        (**self).read_exact(buf)
    }
}

/// [`Transport`] over any blocking `Read + Write` stream, such as a
/// `TcpStream` or `UnixStream`.
#[derive(Debug)]
pub struct StreamTransport<S> {
    inner: S,
}

impl<S> StreamTransport<S> {
    pub fn new(inner: S) -> Self {
        Self { inner }
    }

    pub fn get_ref(&self) -> &S {
        &self.inner
    }

    pub fn get_mut(&mut self) -> &mut S {
        &mut self.inner
    }

    pub fn into_inner(self) -> S {
        self.inner
    }
}

impl<S: Read + Write> Transport for StreamTransport<S> {
    fn write_exact(&mut self, bufs: &[IoSlice<'_>]) -> io::Result<usize> {
        let mut slices = bufs.to_vec();
        let mut remaining = &mut slices[..];
        // drops leading empty slices
        IoSlice::advance_slices(&mut remaining, 0);

        let mut written = 0;
        while !remaining.is_empty() {
            match self.inner.write_vectored(remaining) {
                Ok(0) => {
                    return Err(io::Error::new(
                        io::ErrorKind::WriteZero,
                        "write_vectored returned 0",
                    ));
                }
                Ok(n) => {
                    written += n;
                    IoSlice::advance_slices(&mut remaining, n);
                }
                Err(e) if e.kind() == io::ErrorKind::Interrupted => {}
                Err(e) => return Err(e),
            }
        }

        self.inner.flush()?;
        Ok(written)
    }

    fn read_exact(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.inner.read_exact(buf)?;
        Ok(buf.len())
    }
}

#[cfg(test)]
mod test {
    use super::{StreamTransport, Transport};
    use std::io::{self, Cursor, IoSlice, Read, Write};

    /// Accepts at most `chunk` bytes per call and ignores all but the first
    /// buffer, like a congested socket.
    struct Trickle {
        written: Vec<u8>,
        chunk: usize,
        interrupt_next: bool,
    }

    impl Read for Trickle {
        fn read(&mut self, _buf: &mut [u8]) -> io::Result<usize> {
            Ok(0)
        }
    }

    impl Write for Trickle {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            if self.interrupt_next {
                self.interrupt_next = false;
                return Err(io::ErrorKind::Interrupted.into());
            }
            self.interrupt_next = true;
            let n = buf.len().min(self.chunk);
            self.written.extend_from_slice(&buf[..n]);
            Ok(n)
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn test_write_exact_resumes_partial_writes() {
        let mut transport = StreamTransport::new(Trickle {
            written: Vec::new(),
            chunk: 3,
            interrupt_next: false,
        });
        let sent = transport
            .write_exact(&[
                IoSlice::new(&[]),
                IoSlice::new(b"head"),
                IoSlice::new(&[]),
                IoSlice::new(b"payload"),
            ])
            .unwrap();
        assert_eq!(11, sent);
        assert_eq!(b"headpayload", &transport.get_ref().written[..]);
    }

    #[test]
    fn test_write_zero_is_an_error() {
        let mut transport = StreamTransport::new(Trickle {
            written: Vec::new(),
            chunk: 0,
            interrupt_next: false,
        });
        let err = transport.write_exact(&[IoSlice::new(b"x")]).unwrap_err();
        assert_eq!(io::ErrorKind::WriteZero, err.kind());
    }

    #[test]
    fn test_read_exact_eof() {
        let mut transport = StreamTransport::new(Cursor::new(vec![1, 2, 3]));
        let mut buf = [0; 2];
        assert_eq!(2, transport.read_exact(&mut buf).unwrap());
        assert_eq!([1, 2], buf);
        let err = transport.read_exact(&mut buf).unwrap_err();
        assert_eq!(io::ErrorKind::UnexpectedEof, err.kind());
    }

    #[test]
    fn test_empty_write() {
        let mut transport = StreamTransport::new(Cursor::new(Vec::new()));
        assert_eq!(0, transport.write_exact(&[IoSlice::new(&[])]).unwrap());
        assert!(transport.into_inner().into_inner().is_empty());
    }
}
