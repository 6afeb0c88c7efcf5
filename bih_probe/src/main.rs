//! BIH probe
//!
//! Builds a procedural scene (terrain, a pillar and an alpha-tested fence),
//! then runs batches of ray, sweep and stain queries against it and logs what
//! they found and how long they took.
//!
//! Usage: `bih_probe [config.toml|config.ron]`

use std::time::Instant;

use log::{info, warn};
use mesh_bih::foundation::logging::{self, LevelFilter};
use mesh_bih::foundation::math::{transform_point, Quat, Transform};
use mesh_bih::prelude::*;
use rand::Rng;

// Terrain settings
const TERRAIN_CELLS: u32 = 64;
const TERRAIN_CELL_SIZE: f32 = 4.0;
const TERRAIN_AMPLITUDE: f32 = 6.0;

// Query batch sizes
const NUM_RAYS: usize = 10_000;
const NUM_STAINS: usize = 200;
const NUM_DROPS: usize = 50;
const DROP_STEPS: usize = 60;

// Floats per interleaved vertex: x y z u v
const VERTEX_FLOATS: usize = 5;

/// Fence texture: opaque slats with gaps between them
#[derive(Debug)]
struct SlatMask;

impl AlphaMask for SlatMask {
    fn is_opaque(&self, texcoord: Vec2) -> bool {
        (texcoord.x * 8.0).fract() < 0.5
    }
}

/// Interleaved vertices plus triangle indices
struct MeshData {
    vertices: Vec<f32>,
    triangles: Vec<[u32; 3]>,
}

impl MeshData {
    fn positions(&self) -> VertexView<'_> {
        VertexView::new(bytemuck::cast_slice(self.vertices.as_slice()), VERTEX_FLOATS * 4)
    }

    fn texcoords(&self) -> TexcoordView<'_> {
        TexcoordView::new(bytemuck::cast_slice(self.vertices.as_slice()), VERTEX_FLOATS * 4).with_offset(12)
    }
}

fn terrain_height(x: f32, y: f32) -> f32 {
    ((x * 0.05).sin() * (y * 0.07).cos() + (x * 0.013 + y * 0.021).sin()) * TERRAIN_AMPLITUDE
}

fn build_terrain() -> MeshData {
    let n = TERRAIN_CELLS;
    let mut vertices = Vec::with_capacity(((n + 1) * (n + 1)) as usize * VERTEX_FLOATS);
    for j in 0..=n {
        for i in 0..=n {
            let x = i as f32 * TERRAIN_CELL_SIZE;
            let y = j as f32 * TERRAIN_CELL_SIZE;
            let u = i as f32 / n as f32;
            let v = j as f32 / n as f32;
            vertices.extend_from_slice(&[x, y, terrain_height(x, y), u, v]);
        }
    }

    let mut triangles = Vec::with_capacity((n * n * 2) as usize);
    for j in 0..n {
        for i in 0..n {
            let a = j * (n + 1) + i;
            triangles.push([a, a + 1, a + n + 2]);
            triangles.push([a, a + n + 2, a + n + 1]);
        }
    }
    MeshData { vertices, triangles }
}

/// Unit cube centered on the origin, faces wound outward
fn build_cube() -> MeshData {
    let mut vertices = Vec::new();
    for k in 0..8 {
        let corner = [k & 1, (k >> 1) & 1, (k >> 2) & 1].map(|b| b as f32 - 0.5);
        vertices.extend_from_slice(&[corner[0], corner[1], corner[2], 0.0, 0.0]);
    }
    let triangles = vec![
        [0, 2, 1], [1, 2, 3], // -z
        [4, 5, 6], [5, 7, 6], // +z
        [0, 1, 4], [1, 5, 4], // -y
        [2, 6, 3], [3, 6, 7], // +y
        [0, 4, 2], [2, 4, 6], // -x
        [1, 3, 5], [3, 7, 5], // +x
    ];
    MeshData { vertices, triangles }
}

/// Single vertical quad in the XZ plane
fn build_fence() -> MeshData {
    MeshData {
        vertices: vec![
            0.0, 0.0, 0.0, 0.0, 0.0,
            1.0, 0.0, 0.0, 1.0, 0.0,
            1.0, 0.0, 1.0, 1.0, 1.0,
            0.0, 0.0, 1.0, 0.0, 1.0,
        ],
        triangles: vec![[0, 1, 2], [0, 2, 3]],
    }
}

fn load_config() -> BihConfig {
    let Some(path) = std::env::args().nth(1) else {
        return BihConfig::default();
    };
    match BihConfig::load_from_file(&path) {
        Ok(config) => {
            info!("Loaded configuration from {}", path);
            config
        }
        Err(e) => {
            warn!("Failed to load {}: {}, using defaults", path, e);
            BihConfig::default()
        }
    }
}

fn run_rays(bih: &Bih<'_>, extent: f32) {
    let mut rng = rand::thread_rng();
    let start = Instant::now();
    let mut hits = 0;
    let mut fence_hits = 0;
    let mut total_distance = 0.0;
    for _ in 0..NUM_RAYS {
        let origin = Vec3::new(
            rng.gen_range(0.0..extent),
            rng.gen_range(0.0..extent),
            TERRAIN_AMPLITUDE * 4.0,
        );
        let ray = Vec3::new(rng.gen_range(-0.3..0.3), rng.gen_range(-0.3..0.3), -1.0);
        let mode = RayMode::RENDER | RayMode::NEAREST | RayMode::ALPHA_TEST;
        if let Some(hit) = bih.traverse(&origin, &ray, 1000.0, mode) {
            hits += 1;
            total_distance += hit.distance;
            if hit.mesh == 2 {
                fence_hits += 1;
            }
        }
    }
    let elapsed = start.elapsed();
    info!(
        "Rays: {}/{} hit ({} on the fence), mean distance {:.2}, {:.2} us per ray",
        hits,
        NUM_RAYS,
        fence_hits,
        if hits > 0 { total_distance / hits as f32 } else { 0.0 },
        elapsed.as_secs_f64() * 1e6 / NUM_RAYS as f64
    );
}

fn run_placed_rays(bih: &Bih<'_>) {
    let placement = Placement::new(Vec3::new(500.0, -200.0, 10.0), 45.0, 10.0, 0.0, 0.5);
    let target = transform_point(&placement.to_matrix(), &bih.center());
    let origin = target + Vec3::new(0.0, 0.0, 100.0);
    match bih.intersect_placed(&placement, &origin, &(target - origin), 2.0, RayMode::NEAREST) {
        Some(hit) => info!(
            "Placed instance hit at t={:.3}, normal {:?}, mesh {} triangle {}",
            hit.distance, hit.normal, hit.mesh, hit.triangle
        ),
        None => info!("Placed instance ray missed"),
    }
}

fn run_drops(bih: &Bih<'_>, extent: f32) {
    let mut rng = rand::thread_rng();
    let gravity = Vec3::new(0.0, 0.0, -1.5);
    let placement = Placement::default();
    let start = Instant::now();
    let mut landed = 0;
    let mut stuck = 0;
    for index in 0..NUM_DROPS {
        let eye = Vec3::new(
            rng.gen_range(8.0..extent - 8.0),
            rng.gen_range(8.0..extent - 8.0),
            TERRAIN_AMPLITUDE * 3.0,
        );
        let mut entity = PhysEntity::from_eye(eye, 0.5, 1.6, 0.2);
        let use_ellipse = index % 2 == 1;
        for _ in 0..DROP_STEPS {
            entity.begin_sweep(&gravity);
            let blocked = if use_ellipse {
                bih.ellipse_collide(&mut entity, &gravity, 0.0, &placement)
            } else {
                bih.box_collide(&mut entity, &gravity, 0.0, &placement)
            };
            let step = entity.contact.allowed.max(0.0).min(gravity.norm());
            entity.center += gravity.normalize() * step;
            if entity.contact.inside {
                stuck += 1;
                break;
            }
            if blocked && entity.contact.allowed <= 1e-3 {
                landed += 1;
                break;
            }
        }
    }
    info!(
        "Drops: {} landed, {} started inside geometry, {} still falling ({:.2} ms)",
        landed,
        stuck,
        NUM_DROPS - landed - stuck,
        start.elapsed().as_secs_f64() * 1e3
    );
}

fn run_stains(bih: &Bih<'_>, extent: f32) {
    let mut rng = rand::thread_rng();
    let placement = Placement::default();
    let start = Instant::now();
    let mut gathered: Vec<Triangle> = Vec::new();
    let mut largest = 0;
    for _ in 0..NUM_STAINS {
        let x = rng.gen_range(0.0..extent);
        let y = rng.gen_range(0.0..extent);
        let center = Vec3::new(x, y, terrain_height(x, y));
        gathered.clear();
        let count = bih.gen_stain_tris(&mut gathered, &center, rng.gen_range(1.0..12.0), &placement);
        largest = largest.max(count);
    }
    info!(
        "Stains: {} gathered, largest {} triangles ({:.2} ms)",
        NUM_STAINS,
        largest,
        start.elapsed().as_secs_f64() * 1e3
    );
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    logging::init(LevelFilter::Info);
    let config = load_config();

    let terrain = build_terrain();
    let cube = build_cube();
    let fence = build_fence();
    let mask = SlatMask;
    let extent = TERRAIN_CELLS as f32 * TERRAIN_CELL_SIZE;

    let pillar = Transform::from_position_rotation(
        Vec3::new(extent * 0.5, extent * 0.5, 10.0),
        Quat::from_axis_angle(&Vec3::z_axis(), 0.6),
    )
    .with_uniform_scale(20.0);
    let gate = Transform::from_position(Vec3::new(extent * 0.25, extent * 0.25, -10.0))
        .with_uniform_scale(40.0);

    let meshes = vec![
        MeshDescriptor::new(terrain.positions(), &terrain.triangles)
            .with_texcoords(terrain.texcoords()),
        MeshDescriptor::new(cube.positions(), &cube.triangles)
            .with_transform(pillar.to_matrix())
            .with_flags(MeshFlags::default() | MeshFlags::CULL_FACE),
        MeshDescriptor::new(fence.positions(), &fence.triangles)
            .with_texcoords(fence.texcoords())
            .with_transform(gate.to_matrix())
            .with_flags(MeshFlags::RENDER | MeshFlags::ALPHA | MeshFlags::NOCLIP)
            .with_alpha_mask(&mask),
    ];

    let start = Instant::now();
    let bih = Bih::build(meshes, &config)?;
    info!(
        "Built {} meshes, {} triangles, {} nodes in {:.2} ms, radius {:.1}",
        bih.meshes().len(),
        bih.triangle_count(),
        bih.node_count(),
        start.elapsed().as_secs_f64() * 1e3,
        bih.radius()
    );
    for (index, mesh) in bih.meshes().iter().enumerate() {
        info!(
            "  mesh {}: {} triangles, {} nodes, depth {}, flags {:?}",
            index,
            mesh.triangle_count(),
            mesh.node_count(),
            mesh.depth(),
            mesh.flags()
        );
    }

    run_rays(&bih, extent);
    run_placed_rays(&bih);
    run_drops(&bih, extent);
    run_stains(&bih, extent);
    Ok(())
}
