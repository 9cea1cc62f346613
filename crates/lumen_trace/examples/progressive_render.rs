//! Render a small box scene progressively and write it as a PPM.
//!
//! Usage: cargo run --release --example progressive_render [frames] [output.ppm]

use std::fs::File;
use std::io::{BufWriter, Write};
use std::sync::Arc;

use anyhow::Context;
use lumen_trace::{
    Camera, Color, LightDescriptor, Mat4, Material, RenderConfig, Renderer, SceneSnapshot,
    TriangleMesh, Vec3,
};

const WIDTH: u32 = 320;
const HEIGHT: u32 = 240;

fn build_scene() -> anyhow::Result<SceneSnapshot> {
    let mut scene = SceneSnapshot::new();

    let white = scene.add_material(Material::diffuse(Color::splat(0.73)));
    let red = scene.add_material(Material::diffuse(Color::new(0.65, 0.05, 0.05)));
    let green = scene.add_material(Material::diffuse(Color::new(0.12, 0.45, 0.15)));
    let steel = scene.add_material(Material::metal(Color::splat(0.8), 0.2));
    let glass = scene.add_material(Material::glass(1.5));
    let lamp = scene.add_material(Material::emissive(Color::new(1.0, 0.9, 0.8), 12.0));

    let quad = |corner: Vec3, u: Vec3, v: Vec3| Arc::new(TriangleMesh::quad(corner, u, v));

    // Floor, ceiling, back wall, side walls of a 2x2x2 box around the origin
    scene.add_object(quad(Vec3::new(-1.0, 0.0, 1.0), Vec3::X * 2.0, Vec3::NEG_Z * 2.0), Mat4::IDENTITY, white);
    scene.add_object(quad(Vec3::new(-1.0, 2.0, -1.0), Vec3::X * 2.0, Vec3::Z * 2.0), Mat4::IDENTITY, white);
    scene.add_object(quad(Vec3::new(-1.0, 0.0, -1.0), Vec3::X * 2.0, Vec3::Y * 2.0), Mat4::IDENTITY, white);
    scene.add_object(quad(Vec3::new(-1.0, 0.0, 1.0), Vec3::NEG_Z * 2.0, Vec3::Y * 2.0), Mat4::IDENTITY, red);
    scene.add_object(quad(Vec3::new(1.0, 0.0, -1.0), Vec3::Z * 2.0, Vec3::Y * 2.0), Mat4::IDENTITY, green);

    // Ceiling lamp, seen directly and reached by bounce light
    scene.add_object(quad(Vec3::new(-0.3, 1.99, -0.3), Vec3::X * 0.6, Vec3::Z * 0.6), Mat4::IDENTITY, lamp);

    // A unit cube mesh placed twice
    let cube = Arc::new(unit_cube()?);
    let tall = Mat4::from_translation(Vec3::new(-0.35, 0.6, -0.3))
        * Mat4::from_rotation_y(0.3)
        * Mat4::from_scale(Vec3::new(0.5, 1.2, 0.5));
    let short = Mat4::from_translation(Vec3::new(0.4, 0.3, 0.3))
        * Mat4::from_rotation_y(-0.3)
        * Mat4::from_scale(Vec3::splat(0.6));
    scene.add_object(Arc::clone(&cube), tall, steel);
    scene.add_object(cube, short, glass);

    // Lights are not geometry: a soft fill panel in front of the box facing
    // -z, invisible to the camera, plus a dim point light.
    scene.add_light(LightDescriptor::quad(
        Vec3::new(-0.5, 0.5, 3.0),
        Vec3::Y,
        Vec3::X,
        Color::new(0.8, 0.85, 1.0),
        2.0,
    ));
    scene.add_light(LightDescriptor::point(Vec3::new(0.0, 1.5, 0.8), Color::ONE, 0.5));

    Ok(scene)
}

fn unit_cube() -> anyhow::Result<TriangleMesh> {
    let positions = (0..8)
        .map(|i| {
            Vec3::new(
                if i & 1 == 0 { -0.5 } else { 0.5 },
                if i & 2 == 0 { -0.5 } else { 0.5 },
                if i & 4 == 0 { -0.5 } else { 0.5 },
            )
        })
        .collect();
    #[rustfmt::skip]
    let indices = vec![
        0, 2, 1, 1, 2, 3, // -z
        4, 5, 6, 5, 7, 6, // +z
        0, 1, 4, 1, 5, 4, // -y
        2, 6, 3, 3, 6, 7, // +y
        0, 4, 2, 2, 4, 6, // -x
        1, 3, 5, 3, 7, 5, // +x
    ];
    Ok(TriangleMesh::new(positions, indices)?)
}

fn to_srgb8(linear: f32) -> u8 {
    let c = linear.clamp(0.0, 1.0);
    let srgb = if c <= 0.003_130_8 {
        c * 12.92
    } else {
        1.055 * c.powf(1.0 / 2.4) - 0.055
    };
    (srgb * 255.0 + 0.5) as u8
}

fn main() -> anyhow::Result<()> {
    env_logger::Builder::from_default_env()
        .filter_level(log::LevelFilter::Info)
        .init();

    let mut args = std::env::args().skip(1);
    let frames: u32 = match args.next() {
        Some(arg) => arg.parse().context("frames must be a number")?,
        None => 64,
    };
    let output = args.next().unwrap_or_else(|| "progressive_render.ppm".to_string());

    let config = RenderConfig {
        convergence_threshold: Some(1e-4),
        ..Default::default()
    };
    let mut renderer = Renderer::new(WIDTH, HEIGHT, config)?;
    renderer.set_scene(&build_scene()?)?;
    renderer.set_camera(Some(Camera::look_at(
        Vec3::new(0.0, 1.0, 3.8),
        Vec3::new(0.0, 1.0, 0.0),
        Vec3::Y,
        40.0,
    )));

    for _ in 0..frames {
        let stats = renderer.render_frame();
        if stats.frame % 16 == 0 {
            log::info!(
                "frame {}: {} traced, {} converged, {:.2?}",
                stats.frame,
                stats.pixels_traced,
                stats.converged_pixels,
                stats.elapsed
            );
        }
        if renderer.is_converged() {
            break;
        }
    }

    let image = renderer.resolve();
    let file = File::create(&output).with_context(|| format!("creating {output}"))?;
    let mut out = BufWriter::new(file);
    writeln!(out, "P6\n{} {}\n255", image.width, image.height)?;
    for value in image.as_f32_slice() {
        out.write_all(&[to_srgb8(*value)])?;
    }
    out.flush()?;

    log::info!("Wrote {} ({} frames)", output, renderer.frame());
    Ok(())
}
