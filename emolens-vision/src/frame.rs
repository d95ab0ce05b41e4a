use std::borrow::Cow;

use anyhow::Result;

/// How the chroma planes are subsampled relative to luma.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Subsampling {
    /// Half width, half height (I420, NV12, NV21).
    Yuv420,
    /// Half width, full height (YUYV and friends).
    Yuv422,
    /// Luma only, chroma is implied neutral.
    Monochrome,
}

/// One plane of a YUV image.
///
/// `pixel_stride` is the distance in bytes between two horizontally adjacent
/// samples, so interleaved chroma (NV12) and packed formats (YUYV) can be
/// described as plain planes over a shared buffer.
#[derive(Debug, Clone)]
pub struct Plane<'a> {
    pub data: Cow<'a, [u8]>,
    pub row_stride: usize,
    pub pixel_stride: usize,
}

impl<'a> Plane<'a> {
    pub fn new(data: impl Into<Cow<'a, [u8]>>, row_stride: usize, pixel_stride: usize) -> Self {
        Self {
            data: data.into(),
            row_stride,
            pixel_stride,
        }
    }

    /// Number of bytes a plane needs to hold `cols` x `rows` samples.
    pub fn required_len(&self, cols: usize, rows: usize) -> usize {
        if cols == 0 || rows == 0 {
            return 0;
        }
        (rows - 1) * self.row_stride + (cols - 1) * self.pixel_stride + 1
    }

    #[inline]
    pub fn sample(&self, col: usize, row: usize) -> u8 {
        self.data[row * self.row_stride + col * self.pixel_stride]
    }
}

/// A camera image in planar colour-difference format.
///
/// Planes are ordered Y, U (Cb), V (Cr). Monochrome images carry only Y.
#[derive(Debug, Clone)]
pub struct PlanarImage<'a> {
    pub width: u32,
    pub height: u32,
    pub subsampling: Subsampling,
    pub planes: Vec<Plane<'a>>,
}

impl<'a> PlanarImage<'a> {
    /// Tightly packed I420 image over an owned or borrowed buffer.
    pub fn i420(width: u32, height: u32, data: impl Into<Cow<'a, [u8]>>) -> Self {
        let data = data.into();
        let (w, h) = (width as usize, height as usize);
        let (cw, ch) = (w.div_ceil(2), h.div_ceil(2));
        let y_len = (w * h).min(data.len());
        let u_len = (cw * ch).min(data.len() - y_len);
        let (y, rest) = split_cow(data, y_len);
        let (u, v) = split_cow(rest, u_len);
        Self {
            width,
            height,
            subsampling: Subsampling::Yuv420,
            planes: vec![Plane::new(y, w, 1), Plane::new(u, cw, 1), Plane::new(v, cw, 1)],
        }
    }

    /// NV12 image: full luma plane followed by interleaved U/V pairs.
    pub fn nv12(width: u32, height: u32, data: &'a [u8]) -> Self {
        let w = width as usize;
        let y_len = (w * height as usize).min(data.len());
        let (y, uv) = data.split_at(y_len);
        let v = uv.get(1..).unwrap_or(&[]);
        Self {
            width,
            height,
            subsampling: Subsampling::Yuv420,
            planes: vec![Plane::new(y, w, 1), Plane::new(uv, w, 2), Plane::new(v, w, 2)],
        }
    }

    /// Packed YUYV (4:2:2) image described as three strided planes.
    pub fn yuyv(width: u32, height: u32, data: &'a [u8]) -> Self {
        let row = width as usize * 2;
        let u = data.get(1..).unwrap_or(&[]);
        let v = data.get(3..).unwrap_or(&[]);
        Self {
            width,
            height,
            subsampling: Subsampling::Yuv422,
            planes: vec![Plane::new(data, row, 2), Plane::new(u, row, 4), Plane::new(v, row, 4)],
        }
    }

    pub fn grey(width: u32, height: u32, data: impl Into<Cow<'a, [u8]>>) -> Self {
        Self {
            width,
            height,
            subsampling: Subsampling::Monochrome,
            planes: vec![Plane::new(data, width as usize, 1)],
        }
    }

    /// Size of the chroma grid in samples.
    pub fn chroma_dims(&self) -> (usize, usize) {
        let (w, h) = (self.width as usize, self.height as usize);
        match self.subsampling {
            Subsampling::Yuv420 => (w.div_ceil(2), h.div_ceil(2)),
            Subsampling::Yuv422 => (w.div_ceil(2), h),
            Subsampling::Monochrome => (0, 0),
        }
    }
}

fn split_cow(data: Cow<'_, [u8]>, at: usize) -> (Cow<'_, [u8]>, Cow<'_, [u8]>) {
    match data {
        Cow::Borrowed(b) => {
            let (l, r) = b.split_at(at);
            (Cow::Borrowed(l), Cow::Borrowed(r))
        }
        Cow::Owned(mut v) => {
            let r = v.split_off(at);
            (Cow::Owned(v), Cow::Owned(r))
        }
    }
}

type ReleaseFn<'a> = Box<dyn FnOnce(u64) + 'a>;

/// A frame on loan from a [`FrameSource`].
///
/// The source hands out one proxy at a time; it is released exactly once,
/// either through [`FrameProxy::close`] or when the proxy is dropped.
pub struct FrameProxy<'a> {
    image: Option<PlanarImage<'a>>,
    sequence: u64,
    release: Option<ReleaseFn<'a>>,
}

impl<'a> FrameProxy<'a> {
    pub fn new(
        image: Option<PlanarImage<'a>>,
        sequence: u64,
        release: impl FnOnce(u64) + 'a,
    ) -> Self {
        Self {
            image,
            sequence,
            release: Some(Box::new(release)),
        }
    }

    /// Image payload, `None` when the source could not provide pixel data.
    pub fn image(&self) -> Option<&PlanarImage<'a>> {
        self.image.as_ref()
    }

    pub fn sequence(&self) -> u64 {
        self.sequence
    }

    /// Hand the frame back to its source.
    pub fn close(mut self) {
        self.release();
    }

    fn release(&mut self) {
        if let Some(release) = self.release.take() {
            release(self.sequence);
        }
    }
}

impl Drop for FrameProxy<'_> {
    fn drop(&mut self) {
        self.release();
    }
}

impl std::fmt::Debug for FrameProxy<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FrameProxy")
            .field("sequence", &self.sequence)
            .field("has_image", &self.image.is_some())
            .field("released", &self.release.is_none())
            .finish()
    }
}

/// Lazy producer of camera frames.
///
/// `acquire` borrows the source mutably for the lifetime of the returned
/// proxy, so a new frame cannot be requested before the previous one is
/// released. `Ok(None)` signals the end of the stream.
pub trait FrameSource {
    fn acquire(&mut self) -> Result<Option<FrameProxy<'_>>>;
}

impl<S: FrameSource + ?Sized> FrameSource for Box<S> {
    fn acquire(&mut self) -> Result<Option<FrameProxy<'_>>> {
        (**self).acquire()
    }
}
