/*!
Reading and writing EAs through the operating system.

The two kernel entry points are injected as capabilities: something that
can fill a buffer with a file's records ([`QueryEa`]) and something that
can apply one record to a file ([`SetEa`]). Both take the file handle
explicitly, so nothing is shared between calls; calls on different handles
may run in parallel, calls on the same handle must be serialised by the
caller.
*/

use std::cmp::min;

use anyhow::anyhow;
use anyhow::bail;
use anyhow::ensure;
use anyhow::Context;
use anyhow::Error;
use derivative::Derivative;
use log::debug;

use crate::encode::encode;
use crate::parse::{EaBuffer, EaRecord};
use crate::status::NtStatus;
use crate::verify_failed;
use crate::EaError;

/// What the query primitive did with the buffer it was given.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum QueryOutcome {
    /// The first `n` bytes now hold chained records.
    Filled(usize),
    /// The file has no EAs at all.
    NoAttributes,
    /// Anything else. `BUFFER_OVERFLOW` and `BUFFER_TOO_SMALL` ask for a
    /// bigger buffer.
    Failed(NtStatus),
}

pub trait QueryEa<H: ?Sized> {
    /// Fill `buffer` with every EA on the file, starting from the first.
    fn query_ea(&self, handle: &H, buffer: &mut [u8]) -> QueryOutcome;
}

pub trait SetEa<H: ?Sized> {
    /// Insert or replace the EA described by the single record in `record`.
    fn set_ea(&self, handle: &H, record: &[u8]) -> Result<(), NtStatus>;
}

impl<'a, H: ?Sized, T: QueryEa<H> + ?Sized> QueryEa<H> for &'a T {
    fn query_ea(&self, handle: &H, buffer: &mut [u8]) -> QueryOutcome {
        (**self).query_ea(handle, buffer)
    }
}

impl<'a, H: ?Sized, T: SetEa<H> + ?Sized> SetEa<H> for &'a T {
    fn set_ea(&self, handle: &H, record: &[u8]) -> Result<(), NtStatus> {
        (**self).set_ea(handle, record)
    }
}

#[derive(Clone, Debug)]
pub struct Options {
    /// Size of the first buffer offered to the query primitive.
    pub initial_buffer_size: usize,
    /// The buffer doubles up to this size while the query asks for more room.
    pub max_buffer_size: usize,
    /// Read the attribute back after every write.
    pub verify_after_write: bool,
}

impl Default for Options {
    fn default() -> Self {
        Options {
            initial_buffer_size: 8192,
            max_buffer_size: 1024 * 1024,
            verify_after_write: false,
        }
    }
}

#[derive(Derivative)]
#[derivative(Debug)]
pub struct EaService<Q, S> {
    #[derivative(Debug = "ignore")]
    query: Q,
    #[derivative(Debug = "ignore")]
    set: S,
    options: Options,
}

impl<Q, S> EaService<Q, S> {
    pub fn new(query: Q, set: S) -> EaService<Q, S> {
        EaService {
            query,
            set,
            options: Options::default(),
        }
    }

    pub fn new_with_options(query: Q, set: S, options: Options) -> Result<EaService<Q, S>, Error> {
        ensure!(
            options.initial_buffer_size > 0,
            "initial buffer size must be positive"
        );
        ensure!(
            options.max_buffer_size >= options.initial_buffer_size,
            "max buffer size {} is below the initial size {}",
            options.max_buffer_size,
            options.initial_buffer_size
        );

        Ok(EaService {
            query,
            set,
            options,
        })
    }

    pub fn options(&self) -> &Options {
        &self.options
    }

    /// Give the primitives back.
    pub fn into_inner(self) -> (Q, S) {
        (self.query, self.set)
    }

    /// Run the query primitive until the records fit.
    ///
    /// A file with no EAs gives an empty buffer.
    pub fn query<H: ?Sized>(&self, handle: &H) -> Result<EaBuffer, Error>
    where
        Q: QueryEa<H>,
    {
        let mut size = self.options.initial_buffer_size;

        loop {
            let mut data = vec![0u8; size];
            match self.query.query_ea(handle, &mut data) {
                QueryOutcome::Filled(used) => {
                    debug!("EA query filled {} of {} bytes", used, size);
                    return EaBuffer::new(data, used)
                        .with_context(|| anyhow!("query primitive reported its own length"));
                }
                QueryOutcome::NoAttributes => {
                    debug!("EA query: no attributes on file");
                    return Ok(EaBuffer::empty());
                }
                QueryOutcome::Failed(status)
                    if status.wants_bigger_buffer() && size < self.options.max_buffer_size =>
                {
                    size = min(size.saturating_mul(2), self.options.max_buffer_size);
                    debug!("EA query wants more room ({}), retrying with {} bytes", status, size);
                }
                QueryOutcome::Failed(status) => {
                    debug!("EA query failed with {} at {} bytes", status, size);
                    bail!(EaError::OsQueryFailed { status });
                }
            }
        }
    }

    /// Every EA on the file, in the order the filesystem returns them.
    pub fn read_all<H: ?Sized>(&self, handle: &H) -> Result<Vec<EaRecord>, Error>
    where
        Q: QueryEa<H>,
    {
        let buffer = self.query(handle)?;
        buffer
            .decode_all()
            .with_context(|| anyhow!("decoding {} bytes of EAs", buffer.used_length()))
    }

    /// The EA named exactly `name`, if the file has one.
    pub fn read_one<H: ?Sized>(&self, handle: &H, name: &[u8]) -> Result<Option<EaRecord>, Error>
    where
        Q: QueryEa<H>,
    {
        let buffer = self.query(handle)?;
        buffer.decode_by_name(name).with_context(|| {
            anyhow!(
                "looking for EA {:?} in {} bytes",
                String::from_utf8_lossy(name),
                buffer.used_length()
            )
        })
    }

    /// Insert or replace one EA.
    ///
    /// Invalid names and values are rejected before the set primitive is
    /// called. With `verify_after_write`, the attribute is read back and
    /// returned; otherwise `None` is returned.
    pub fn write<H: ?Sized>(
        &self,
        handle: &H,
        name: &[u8],
        value: &[u8],
    ) -> Result<Option<EaRecord>, Error>
    where
        Q: QueryEa<H>,
        S: SetEa<H>,
    {
        let record = encode(name, value)?;

        debug!(
            "setting EA {:?}: {} value bytes, {} byte record",
            String::from_utf8_lossy(name),
            value.len(),
            record.len()
        );

        if let Err(status) = self.set.set_ea(handle, &record) {
            debug!("EA set failed with {}", status);
            bail!(EaError::OsWriteFailed { status });
        }

        if !self.options.verify_after_write {
            return Ok(None);
        }

        self.verify(handle, name, value)
            .with_context(|| anyhow!("verifying EA {:?}", String::from_utf8_lossy(name)))
    }

    fn verify<H: ?Sized>(&self, handle: &H, name: &[u8], value: &[u8]) -> Result<Option<EaRecord>, Error>
    where
        Q: QueryEa<H>,
    {
        // NTFS hands names back upper-cased
        let written = self
            .read_all(handle)?
            .into_iter()
            .find(|record| record.name.eq_ignore_ascii_case(name));

        match written {
            Some(record) => {
                ensure!(
                    record.value == value,
                    verify_failed(format!(
                        "read back {} bytes, wrote {}",
                        record.value.len(),
                        value.len()
                    ))
                );
                debug!("EA verified after write");
                Ok(Some(record))
            }
            // an empty value removes the attribute
            None if value.is_empty() => Ok(None),
            None => Err(verify_failed("attribute is missing after write").into()),
        }
    }
}
