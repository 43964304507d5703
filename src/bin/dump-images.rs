use docopt::Docopt;
use gleam::gl;
use serde::Deserialize;

use gl_trace::texture::TextureUpdate;
use gl_trace::{Command, Trace};

static USAGE: &str = "
Extract images from a gl-trace capture.

Write each RGBA8 texture image in the captured state as a PNG named
`texture-T-N.png`, where T is the texture's name and N is the update's
position in its list. Then do the same for uploads made during the frame,
naming them `tex_image_2d-I.png`, where I is the packet id.

Usage:
  dump-images <trace>
";

#[derive(Debug, Deserialize)]
struct Args {
    arg_trace: String,
}

/// The pixels of `update`, if they're a tightly packed RGBA8 image.
fn rgba8_pixels(update: &TextureUpdate) -> Option<&[u8]> {
    let store = &update.pixel_store;
    if update.compressed
        || update.depth.is_some()
        || update.format != gl::RGBA
        || update.pixel_type != gl::UNSIGNED_BYTE
        || store.unpack_row_length > 0
        || store.unpack_skip_pixels > 0
        || store.unpack_skip_rows > 0
    {
        return None;
    }
    let len = update.width.max(0) as usize * update.height.max(0) as usize * 4;
    update.pixels.as_ref()?.get(..len)
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();
    let args: Args = Docopt::new(USAGE)
        .and_then(|d| d.deserialize())
        .unwrap_or_else(|e| e.exit());

    let trace = Trace::load_file(&args.arg_trace)?;

    let mut count = 0;
    for (handle, texture) in &trace.state.textures {
        for (i, update) in texture.updates.iter().enumerate() {
            if let Some(pixels) = rgba8_pixels(update) {
                let filename = format!("texture-{}-{}.png", handle, i);
                gl_trace::pixels::write_png(&filename, pixels,
                                            update.width as u32, update.height as u32,
                                            update.format, update.pixel_type)?;
                count += 1;
            }
        }
    }

    for packet in &trace.packets {
        match packet.command {
            Command::tex_image_2d { width, height, format: gl::RGBA,
                                    pixel_type: gl::UNSIGNED_BYTE, ref pixels, .. } => {
                let len = width.max(0) as usize * height.max(0) as usize * 4;
                if let Some(pixels) = pixels.bytes().and_then(|bytes| bytes.get(..len)) {
                    let filename = format!("tex_image_2d-{}.png", packet.id);
                    gl_trace::pixels::write_png(&filename, pixels, width as u32, height as u32,
                                                gl::RGBA, gl::UNSIGNED_BYTE)?;
                    count += 1;
                }
            }
            _ => (),
        }
    }
    println!("wrote {} images", count);

    Ok(())
}
