/// Async counterpart to the standard library's `TryFrom<T>` trait.
///
/// Used for conversions that have to touch the filesystem, such as turning a
/// path into the metadata of the object it names.
///
/// # Examples
///
/// ```rust,ignore
/// use std::path::Path;
///
/// struct FileLen(u64);
///
/// impl AsyncTryFrom<&Path> for FileLen {
///     type Error = std::io::Error;
///
///     async fn async_try_from(path: &Path) -> Result<Self, Self::Error> {
///         let metadata = compio::fs::metadata(path).await?;
///         Ok(FileLen(metadata.len()))
///     }
/// }
/// ```
pub trait AsyncTryFrom<T>: Sized {
    /// The error type that can occur during conversion.
    type Error;

    /// Performs the fallible asynchronous conversion from `T` to `Self`.
    async fn async_try_from(value: T) -> Result<Self, Self::Error>;
}
