//! Owner-feedback visuals: damage vignette and the corpse motion trail.

use bevy::prelude::*;

/// Peak alpha of the damage vignette at full feedback intensity.
const VIGNETTE_MAX_ALPHA: f32 = 0.45;

/// How fast the vignette fades (alpha per second).
const VIGNETTE_FADE: f32 = 1.2;

/// Trail sampling: minimum distance between recorded points.
const TRAIL_MIN_STEP: f32 = 0.05;
const TRAIL_MAX_POINTS: usize = 120;

/// Full-screen red overlay whose alpha follows recent damage.
#[derive(Component)]
pub struct DamageVignette;

#[derive(Resource, Default)]
pub struct VignetteIntensity(pub f32);

impl VignetteIntensity {
    pub fn flash(&mut self, intensity: f32) {
        self.0 = self.0.max(intensity.clamp(0.0, 1.0));
    }
}

/// Recent positions of a rag-dolled corpse piece, drawn as a fading trail.
/// Removed (and therefore cleared) when the character respawns.
#[derive(Component, Default)]
pub struct CorpseTrail {
    pub focus: Option<Entity>,
    points: Vec<Vec3>,
}

impl CorpseTrail {
    pub fn new(focus: Entity) -> Self {
        Self {
            focus: Some(focus),
            points: Vec::new(),
        }
    }
}

/// Spawn the (initially invisible) vignette overlay.
pub fn spawn_damage_vignette(mut commands: Commands) {
    commands.spawn((
        DamageVignette,
        Node {
            position_type: PositionType::Absolute,
            width: Val::Percent(100.0),
            height: Val::Percent(100.0),
            ..default()
        },
        BackgroundColor(Color::srgba(0.8, 0.05, 0.05, 0.0)),
        // Stays behind any HUD drawn later.
        ZIndex(-1),
    ));
}

/// Fade the vignette toward transparent.
pub fn update_damage_vignette(
    time: Res<Time>,
    mut intensity: ResMut<VignetteIntensity>,
    mut vignettes: Query<&mut BackgroundColor, With<DamageVignette>>,
) {
    intensity.0 = (intensity.0 - VIGNETTE_FADE * time.delta_secs()).max(0.0);

    let Ok(mut color) = vignettes.single_mut() else {
        return;
    };
    color.0 = Color::srgba(0.8, 0.05, 0.05, intensity.0 * VIGNETTE_MAX_ALPHA);
}

/// Record corpse positions and draw the trail with gizmos.
pub fn update_corpse_trails(
    mut gizmos: Gizmos,
    transforms: Query<&GlobalTransform>,
    mut trails: Query<&mut CorpseTrail>,
) {
    for mut trail in trails.iter_mut() {
        if let Some(pos) = trail
            .focus
            .and_then(|e| transforms.get(e).ok())
            .map(|t| t.translation())
        {
            let moved = trail
                .points
                .last()
                .map(|last| last.distance(pos) > TRAIL_MIN_STEP)
                .unwrap_or(true);
            if moved {
                trail.points.push(pos);
                if trail.points.len() > TRAIL_MAX_POINTS {
                    trail.points.remove(0);
                }
            }
        }

        for window in trail.points.windows(2) {
            gizmos.line(
                window[0],
                window[1],
                Color::srgba(0.9, 0.2, 0.2, 0.6),
            );
        }
    }
}
