/// `parallelize_op!` macro for repeating a per-frame operation
/// across chunks of a list of frames.
///
/// - `parallelize_op!(chunk_size, frames, filename, op)`
///
///     Splits `frames` into chunks of at most `chunk_size`
///     and runs `op` on each chunk in parallel. Every chunk
///     opens its own local copy of the file, so no reader is
///     shared between threads. `op` should have the signature
///     `op(frames : &[u32], reader : &mut BinaryReader<BufReader<File>>)
///     -> Result<Vec<T>, Nd2Error>`.
///
///     Evaluates to `Result<Vec<T>, Nd2Error>` with the outputs
///     in the same order as `frames`. The first error from
///     any chunk is returned.
///
///     <br>
///
/// - `parallelize_op!(chunk_size, frames, filename, reader_call, op)`
///
///     Allows an alternative way of creating each local reader
///     (e.g. for tests that need to count how often the file is
///     opened) using a closure expecting the `filename` arg and
///     returning `Result<BinaryReader<_>, Nd2Error>`.
macro_rules! parallelize_op {
    (   $chunk_size : expr,
        $frames : expr,
        $filename : expr,
        $op : expr
    ) => {
        parallelize_op!(
            $chunk_size,
            $frames,
            $filename,
            |filename : &std::path::Path| -> Result<_, $crate::Nd2Error> {
                let file = std::fs::File::open(filename)?;
                $crate::binary::BinaryReader::new(std::io::BufReader::new(file))
            },
            $op
        )
    };

    (   $chunk_size : expr,
        $frames : expr,
        $filename : expr,
        $reader_call : expr,
        $op : expr
    ) => {{
        use rayon::prelude::*;

        let frames : &[u32] = $frames;
        let chunk_size : usize = ($chunk_size as usize).max(1);
        let filename : &std::path::Path = $filename;

        frames.par_chunks(chunk_size)
            .map(|local_frames| -> Result<Vec<_>, $crate::Nd2Error> {
                let mut local_reader = $reader_call(filename)?;
                $op(local_frames, &mut local_reader)
            })
            .collect::<Result<Vec<Vec<_>>, $crate::Nd2Error>>()
            .map(|chunks| chunks.into_iter().flatten().collect::<Vec<_>>())
    }};
}

pub (crate) use parallelize_op;
