//! Renderer collaborator and the render submission system.
//!
//! The simulation never talks to a GPU. It creates textures through a
//! [`Renderer`] (adapted into the asset loader by [`TextureLoader`]) and each
//! step hands the renderer one [`DrawCall`] per visible sprite, in ascending
//! `z` order.

use std::cell::RefCell;
use std::rc::Rc;

use anyhow::Context;
use glam::{Mat4, Vec3};
use mip_ecs::asset::AssetLoader;
use mip_ecs::entity::EntityId;
use mip_ecs::manager::Manager;
use mip_ecs::system::System;
use tracing::{trace, warn};

use crate::components::{is_active, Sprite, Transform};

// ---------------------------------------------------------------------------
// Renderer collaborator
// ---------------------------------------------------------------------------

/// Backend-assigned texture identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TextureId(pub u32);

/// One sprite draw for the current frame.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DrawCall {
    pub texture: TextureId,
    /// Translate * rotate(Z) * scale, mapping the unit quad to world pixels.
    pub model: Mat4,
    pub z: u32,
}

/// What the simulation needs from a rendering backend.
pub trait Renderer {
    fn create_texture(&mut self, path: &str) -> anyhow::Result<TextureId>;

    fn submit(&mut self, draw: DrawCall);
}

/// A texture asset as seen by the simulation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Texture {
    pub id: TextureId,
    pub path: String,
}

/// Model matrix for `transform`.
pub fn model_matrix(transform: &Transform) -> Mat4 {
    Mat4::from_translation(transform.pos.extend(0.0))
        * Mat4::from_rotation_z(transform.rot.to_radians())
        * Mat4::from_scale(Vec3::new(transform.scale.x, transform.scale.y, 1.0))
}

// ---------------------------------------------------------------------------
// TextureLoader
// ---------------------------------------------------------------------------

/// [`AssetLoader`] for [`Texture`]s backed by a shared renderer.
pub struct TextureLoader<R> {
    renderer: Rc<RefCell<R>>,
}

impl<R> TextureLoader<R> {
    pub fn new(renderer: Rc<RefCell<R>>) -> Self {
        Self { renderer }
    }
}

impl<R: Renderer> AssetLoader<Texture> for TextureLoader<R> {
    fn load(&mut self, key: &str) -> anyhow::Result<Texture> {
        let id = self
            .renderer
            .borrow_mut()
            .create_texture(key)
            .with_context(|| format!("failed to load texture {key}"))?;
        trace!(path = key, id = id.0, "texture created");
        Ok(Texture {
            id,
            path: key.to_owned(),
        })
    }
}

// ---------------------------------------------------------------------------
// RenderSystem
// ---------------------------------------------------------------------------

/// Submits every active sprite that has a transform and a loaded texture.
pub struct RenderSystem<R> {
    renderer: Rc<RefCell<R>>,
    queue: Vec<(u32, EntityId)>,
}

impl<R> RenderSystem<R> {
    pub fn new(renderer: Rc<RefCell<R>>) -> Self {
        Self {
            renderer,
            queue: Vec::with_capacity(128),
        }
    }
}

impl<R: Renderer + 'static> System for RenderSystem<R> {
    fn update(&mut self, manager: &mut Manager, _dt: f32) {
        self.queue.clear();
        let sprites = manager.view::<Sprite>();
        for &entity in sprites.owners() {
            if !is_active(manager, entity) {
                continue;
            }
            match manager.get_component::<Transform>(entity) {
                Some(t) => self.queue.push((t.z, entity)),
                None => warn!(entity = %entity, "sprite without transform skipped"),
            }
        }

        // Stable, so equal z keeps table order.
        self.queue.sort_by_key(|&(z, _)| z);

        let mut renderer = self.renderer.borrow_mut();
        for &(z, entity) in &self.queue {
            let (Some(sprite), Some(transform)) = (
                manager.get_component::<Sprite>(entity),
                manager.get_component::<Transform>(entity),
            ) else {
                continue;
            };
            let Some(texture) = manager.get_asset(sprite.texture) else {
                continue;
            };
            renderer.submit(DrawCall {
                texture: texture.id,
                model: model_matrix(transform),
                z,
            });
        }
    }

    fn name(&self) -> &str {
        "render"
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use glam::{Vec2, Vec4};

    use super::*;
    use crate::components::Active;

    #[derive(Default)]
    struct RecordingRenderer {
        next_id: u32,
        created: Vec<String>,
        draws: Vec<DrawCall>,
    }

    impl Renderer for RecordingRenderer {
        fn create_texture(&mut self, path: &str) -> anyhow::Result<TextureId> {
            if path.is_empty() {
                anyhow::bail!("empty path");
            }
            self.created.push(path.to_owned());
            self.next_id += 1;
            Ok(TextureId(self.next_id))
        }

        fn submit(&mut self, draw: DrawCall) {
            self.draws.push(draw);
        }
    }

    fn setup() -> (Manager, Rc<RefCell<RecordingRenderer>>) {
        let renderer = Rc::new(RefCell::new(RecordingRenderer::default()));
        let mut manager = Manager::new();
        manager.register_component::<Transform>();
        manager.register_component::<Sprite>();
        manager.register_component::<Active>();
        manager.register_asset::<Texture, _>(TextureLoader::new(Rc::clone(&renderer)));
        manager.register_system(RenderSystem::new(Rc::clone(&renderer)));
        (manager, renderer)
    }

    fn spawn_sprite(manager: &mut Manager, path: &str, z: u32) -> EntityId {
        let texture = manager.load_asset::<Texture>(path);
        let e = manager.create_entity();
        manager.add_component(e, Transform::at(Vec2::new(z as f32, 0.0), 10.0, z));
        manager.add_component(e, Sprite { texture });
        e
    }

    #[test]
    fn model_matrix_translates_rotates_and_scales() {
        let t = Transform {
            pos: Vec2::new(5.0, 7.0),
            scale: Vec2::new(2.0, 4.0),
            rot: 90.0,
            z: 0,
        };
        let corner = model_matrix(&t) * Vec4::new(1.0, 0.0, 0.0, 1.0);
        assert!((corner.x - 5.0).abs() < 1e-5);
        assert!((corner.y - 9.0).abs() < 1e-5);
    }

    #[test]
    fn loader_reuses_texture_for_same_path() {
        let (mut manager, renderer) = setup();
        spawn_sprite(&mut manager, "a.png", 0);
        spawn_sprite(&mut manager, "a.png", 1);
        assert_eq!(renderer.borrow().created, vec!["a.png"]);
    }

    #[test]
    fn loader_failure_carries_path() {
        let (mut manager, renderer) = setup();
        let err = manager.try_load_asset::<Texture>("").unwrap_err();
        assert!(err.to_string().contains("failed to load texture"));
        assert!(renderer.borrow().created.is_empty());
    }

    #[test]
    fn draws_are_sorted_by_z() {
        let (mut manager, renderer) = setup();
        spawn_sprite(&mut manager, "top.png", 9);
        spawn_sprite(&mut manager, "bottom.png", 0);
        spawn_sprite(&mut manager, "middle.png", 2);

        manager.step(0.016);

        let zs: Vec<u32> = renderer.borrow().draws.iter().map(|d| d.z).collect();
        assert_eq!(zs, vec![0, 2, 9]);
    }

    #[test]
    fn inactive_and_untextured_sprites_are_not_drawn() {
        let (mut manager, renderer) = setup();
        let hidden = spawn_sprite(&mut manager, "a.png", 1);
        manager.add_component(hidden, Active(false));
        spawn_sprite(&mut manager, "", 2);
        let shown = spawn_sprite(&mut manager, "b.png", 3);

        manager.step(0.016);

        let recorded = renderer.borrow();
        let draws = &recorded.draws;
        assert_eq!(draws.len(), 1);
        assert_eq!(draws[0].z, 3);
        let texture = manager
            .get_component::<Sprite>(shown)
            .and_then(|s| manager.get_asset(s.texture))
            .map(|t| t.id);
        assert_eq!(Some(draws[0].texture), texture);
    }
}
