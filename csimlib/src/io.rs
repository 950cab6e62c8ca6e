use std::fs::File;
use std::ops::Deref;

/// The bytes of a trace file, either memory mapped or read into memory
pub enum TraceBytes {
    #[cfg(unix)]
    Mapped(memmap2::Mmap),
    Owned(Vec<u8>),
}

impl Deref for TraceBytes {
    type Target = [u8];

    fn deref(&self) -> &[u8] {
        match self {
            #[cfg(unix)]
            TraceBytes::Mapped(m) => &m[..],
            TraceBytes::Owned(v) => &v[..],
        }
    }
}

/// Gets the contents of a trace file in a form the simulator can replay
pub fn get_trace_bytes(file: File) -> Result<TraceBytes, String> {
    let length = file.metadata().map_err(|e| format!("Couldn't read the trace file metadata: {e}"))?.len();
    // Mapping an empty file fails on some systems, and there is nothing to gain from it
    if length == 0 {
        return Ok(TraceBytes::Owned(Vec::new()));
    }
    // Compatibility on other systems
    #[cfg(not(unix))]
    {
        use std::io::Read;
        let mut file = file;
        let mut buf = Vec::with_capacity(length as usize);
        file.read_to_end(&mut buf).map_err(|e| format!("Couldn't read the trace file: {e}"))?;
        Ok(TraceBytes::Owned(buf))
    }
    // Memory map the file for speed on unix systems
    #[cfg(unix)]
    {
        use memmap2::{Advice, Mmap};
        // Safe as long as the trace isn't modified while the simulation runs
        unsafe {
            let m = Mmap::map(&file).map_err(|e| format!("Couldn't memory map the file: {e}"))?;
            m.advise(Advice::Sequential).map_err(|e| format!("Failed to provide access advice to the OS, {e}"))?;
            Ok(TraceBytes::Mapped(m))
        }
    }
}
