//! Frame controller behaviour over many frames.

use std::f32::consts::PI;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use lumen_trace::{
    AccumulationBuffer, Camera, Color, LightDescriptor, LightStrategy, Mat4, Material, PixelState,
    RenderConfig, Renderer, Sampler, SceneGeometry, SceneSnapshot, TraceContext, TriangleMesh, Vec3,
};

const SIZE: u32 = 12;

fn lit_floor() -> SceneSnapshot {
    let mut scene = SceneSnapshot::new();
    let floor = scene.add_material(Material::diffuse(Color::splat(0.6)));
    let lamp = scene.add_material(Material::emissive(Color::ONE, 4.0));
    scene.add_object(
        Arc::new(TriangleMesh::quad(Vec3::new(-10.0, 0.0, 10.0), Vec3::X * 20.0, Vec3::NEG_Z * 20.0)),
        Mat4::IDENTITY,
        floor,
    );
    scene.add_object(
        Arc::new(TriangleMesh::quad(Vec3::new(-1.0, 3.0, 1.0), Vec3::X * 2.0, Vec3::NEG_Z * 2.0)),
        Mat4::IDENTITY,
        lamp,
    );
    scene.add_light(LightDescriptor::point(Vec3::new(1.0, 2.0, 0.5), Color::ONE, 3.0));
    scene.add_light(LightDescriptor::quad(
        Vec3::new(-2.0, 2.5, -1.0),
        Vec3::X,
        Vec3::Z,
        Color::new(1.0, 0.8, 0.6),
        2.0,
    ));
    scene
}

fn overhead_camera() -> Camera {
    Camera::look_at(Vec3::new(0.0, 1.5, 0.0), Vec3::ZERO, Vec3::Y, 60.0)
}

fn renderer(config: RenderConfig) -> Renderer {
    let mut renderer = Renderer::new(SIZE, SIZE, config).unwrap();
    renderer.set_scene(&lit_floor()).unwrap();
    renderer.set_camera(Some(overhead_camera()));
    renderer
}

fn render(renderer: &mut Renderer, frames: u32) {
    for _ in 0..frames {
        let stats = renderer.render_frame();
        assert!(!stats.discarded);
    }
}

fn image_mean(renderer: &Renderer) -> Vec3 {
    let image = renderer.resolve();
    image.pixels.iter().copied().sum::<Vec3>() / image.pixels.len() as f32
}

#[test]
fn test_same_seed_gives_identical_images() {
    let mut renderer = renderer(RenderConfig::default());
    render(&mut renderer, 8);
    let first = renderer.resolve();

    renderer.reset();
    render(&mut renderer, 8);
    assert_eq!(renderer.resolve(), first);
}

#[test]
fn test_parallel_and_serial_batches_agree() {
    let mut parallel = renderer(RenderConfig::default());
    let mut serial = renderer(RenderConfig {
        parallel: false,
        ..Default::default()
    });
    render(&mut parallel, 6);
    render(&mut serial, 6);
    assert_eq!(parallel.resolve(), serial.resolve());
}

#[test]
fn test_every_pixel_gets_one_sample_per_frame() {
    let mut renderer = renderer(RenderConfig::default());
    let stats = renderer.render_frame();
    assert_eq!(stats.frame, 1);
    assert_eq!(stats.pixels_traced, (SIZE * SIZE) as usize);

    render(&mut renderer, 4);
    for y in 0..SIZE {
        for x in 0..SIZE {
            assert_eq!(renderer.sample_count(x, y), Some(5));
            assert_eq!(renderer.pixel_state(x, y), Some(PixelState::Accumulating));
        }
    }
}

#[test]
fn test_sample_cap_converges_the_image() {
    let mut renderer = renderer(RenderConfig {
        max_samples_per_pixel: 3,
        ..Default::default()
    });
    render(&mut renderer, 3);
    assert!(renderer.is_converged());

    let before = renderer.resolve();
    let stats = renderer.render_frame();
    assert_eq!(stats.pixels_traced, 0);
    assert_eq!(stats.converged_pixels, (SIZE * SIZE) as usize);
    assert_eq!(renderer.resolve(), before);
}

#[test]
fn test_reset_request_clears_accumulation() {
    let mut renderer = renderer(RenderConfig::default());
    render(&mut renderer, 4);
    assert_eq!(renderer.frame(), 4);

    renderer.reset_handle().request_reset();
    let stats = renderer.render_frame();
    assert_eq!(stats.frame, 1);
    assert_eq!(renderer.sample_count(0, 0), Some(1));
}

#[test]
fn test_no_camera_means_no_work() {
    let mut renderer = Renderer::new(SIZE, SIZE, RenderConfig::default()).unwrap();
    renderer.set_scene(&lit_floor()).unwrap();
    assert!(!renderer.is_ready());

    let stats = renderer.render_frame();
    assert_eq!(stats.pixels_traced, 0);
    assert_eq!(renderer.frame(), 0);
    assert_eq!(renderer.pixel_state(0, 0), Some(PixelState::Clean));
}

#[test]
fn test_temporal_reuse_matches_all_lights_on_average() {
    let direct = |light_strategy| RenderConfig {
        max_bounces: 1,
        light_strategy,
        ..Default::default()
    };

    let mut reference = renderer(direct(LightStrategy::AllLights));
    let mut reused = renderer(direct(LightStrategy::Reservoir {
        candidates: 4,
        temporal_reuse: true,
    }));
    render(&mut reference, 64);
    render(&mut reused, 64);

    let expected = image_mean(&reference);
    let actual = image_mean(&reused);
    for (a, e) in actual.to_array().into_iter().zip(expected.to_array()) {
        assert!((a - e).abs() <= 0.05 * e, "got {actual:?}, expected {expected:?}");
    }
}

#[test]
fn test_variance_of_the_mean_shrinks_with_samples() {
    let geometry = SceneGeometry::build(&lit_floor()).unwrap();
    let config = RenderConfig::default();
    let ctx = TraceContext::new(&geometry, &config);
    let camera = overhead_camera();
    let mut buffer = AccumulationBuffer::new(SIZE, SIZE, &config).unwrap();

    let sample_frames = |buffer: &mut AccumulationBuffer, frames: u32| {
        for _ in 0..frames {
            for y in 0..SIZE {
                for x in 0..SIZE {
                    let index = buffer.index(x, y).unwrap();
                    let count = buffer.pixel_at(index).count() as u64;
                    let mut sampler = Sampler::for_pixel(config.seed, index as u64, count);
                    let ray = camera.generate_ray(x, y, SIZE, SIZE, &mut sampler).unwrap();
                    let path = ctx.trace(ray, &mut sampler, None);
                    buffer.add_sample(index, path.radiance);
                }
            }
        }
    };
    let average_mean_variance = |buffer: &AccumulationBuffer| {
        (0..buffer.len()).map(|i| buffer.pixel_at(i).mean_variance()).sum::<f32>() / buffer.len() as f32
    };

    sample_frames(&mut buffer, 64);
    let early = average_mean_variance(&buffer);
    sample_frames(&mut buffer, 192);
    let late = average_mean_variance(&buffer);

    assert!(early > 0.0);
    assert!(late < 0.5 * early, "early {early}, late {late}");
}

#[test]
fn test_reset_during_a_batch_discards_it() {
    let size = 256;
    let mut renderer = Renderer::new(size, size, RenderConfig::default()).unwrap();
    renderer.set_scene(&lit_floor()).unwrap();
    renderer.set_camera(Some(overhead_camera()));

    // Keep requesting resets so one lands while the batch is in flight.
    let handle = renderer.reset_handle();
    let stop = Arc::new(AtomicBool::new(false));
    let resetter = {
        let stop = Arc::clone(&stop);
        thread::spawn(move || {
            while !stop.load(Ordering::Acquire) {
                handle.request_reset();
                thread::sleep(Duration::from_millis(1));
            }
        })
    };

    let stats = renderer.render_frame();
    stop.store(true, Ordering::Release);
    resetter.join().unwrap();

    assert!(stats.discarded);
    assert_eq!(stats.pixels_traced, 0);
    assert_eq!(renderer.frame(), 0);
    assert_eq!(renderer.sample_count(0, 0), Some(0));
    assert_eq!(renderer.sample_count(size / 2, size / 2), Some(0));

    // With no more requests the next batch commits.
    let stats = renderer.render_frame();
    assert!(!stats.discarded);
    assert_eq!(renderer.sample_count(0, 0), Some(1));
}

#[test]
fn test_downward_camera_sees_the_form_factor() {
    // 2x2 emitter two units above a diffuse floor, no light descriptors.
    let albedo = 0.8;
    let emitted = 5.0;
    let mut scene = SceneSnapshot::new();
    let floor = scene.add_material(Material::diffuse(Color::splat(albedo)));
    let lamp = scene.add_material(Material::emissive(Color::ONE, emitted));
    scene.add_object(
        Arc::new(TriangleMesh::quad(Vec3::new(-20.0, 0.0, 20.0), Vec3::X * 40.0, Vec3::NEG_Z * 40.0)),
        Mat4::IDENTITY,
        floor,
    );
    scene.add_object(
        Arc::new(TriangleMesh::quad(Vec3::new(-1.0, 2.0, 1.0), Vec3::X * 2.0, Vec3::NEG_Z * 2.0)),
        Mat4::IDENTITY,
        lamp,
    );

    let frames = 2_000;
    let size = 9;
    let mut renderer = Renderer::new(
        size,
        size,
        RenderConfig {
            max_samples_per_pixel: frames,
            ..Default::default()
        },
    )
    .unwrap();
    renderer.set_scene(&scene).unwrap();
    // Narrow view so every pixel sees the floor right below the emitter
    renderer.set_camera(Some(Camera::look_at(Vec3::new(0.0, 1.0, 0.0), Vec3::ZERO, Vec3::Z, 5.0)));
    for _ in 0..frames {
        renderer.render_frame();
    }
    assert!(renderer.is_converged());

    let quarter = |a: f32, b: f32, c: f32| {
        let (a, b) = (a / c, b / c);
        let sa = (1.0 + a * a).sqrt();
        let sb = (1.0 + b * b).sqrt();
        (a / sa * (b / sa).atan() + b / sb * (a / sb).atan()) / (2.0 * PI)
    };
    let expected = albedo * emitted * 4.0 * quarter(1.0, 1.0, 2.0);

    let center = renderer.radiance(size / 2, size / 2).unwrap();
    assert!((center.x - expected).abs() <= 0.15 * expected, "center {center:?}, expected {expected}");

    let mean = image_mean(&renderer);
    for channel in mean.to_array() {
        assert!((channel - expected).abs() <= 0.1 * expected, "mean {mean:?}, expected {expected}");
    }
}
