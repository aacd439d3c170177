//! Player input handling
//!
//! Updated for Lightyear 0.25 / Bevy 0.17

use bevy::input::mouse::MouseMotion;
use bevy::prelude::*;
use lightyear::prelude::*;
use shared::{InputChannel, PlayerInput, MOUSE_SENSITIVITY};
use std::f32::consts::FRAC_PI_2;

/// Camera view mode
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum CameraMode {
    #[default]
    FirstPerson,
    ThirdPerson,
}

/// Client-side input state
#[derive(Resource, Default)]
pub struct InputState {
    pub forward: bool,
    pub backward: bool,
    pub left: bool,
    pub right: bool,
    /// Jump request (spacebar)
    pub jump: bool,
    /// Hold Shift to sprint
    pub sprint: bool,
    /// Hold Ctrl to crouch
    pub crouch: bool,
    /// Mouse-controlled yaw
    pub yaw: f32,
    /// Mouse-controlled pitch
    pub pitch: f32,

    /// Camera mode (toggle with P)
    pub camera_mode: CameraMode,
}

/// Handle keyboard input for movement
pub fn handle_keyboard_input(
    keyboard: Res<ButtonInput<KeyCode>>,
    mut input_state: ResMut<InputState>,
) {
    input_state.forward = keyboard.pressed(KeyCode::KeyW);
    input_state.backward = keyboard.pressed(KeyCode::KeyS);
    input_state.left = keyboard.pressed(KeyCode::KeyA);
    input_state.right = keyboard.pressed(KeyCode::KeyD);
    input_state.jump = keyboard.pressed(KeyCode::Space);
    input_state.sprint =
        keyboard.pressed(KeyCode::ShiftLeft) || keyboard.pressed(KeyCode::ShiftRight);
    input_state.crouch =
        keyboard.pressed(KeyCode::ControlLeft) || keyboard.pressed(KeyCode::KeyC);

    // Toggle camera mode with P
    if keyboard.just_pressed(KeyCode::KeyP) {
        input_state.camera_mode = match input_state.camera_mode {
            CameraMode::FirstPerson => CameraMode::ThirdPerson,
            CameraMode::ThirdPerson => CameraMode::FirstPerson,
        };
        info!("Camera mode: {:?}", input_state.camera_mode);
    }
}

/// Handle mouse input for looking around
pub fn handle_mouse_input(
    mut mouse_motion: MessageReader<MouseMotion>,
    mut input_state: ResMut<InputState>,
) {
    let mut delta = Vec2::ZERO;
    for motion in mouse_motion.read() {
        delta += motion.delta;
    }

    if delta != Vec2::ZERO {
        input_state.yaw -= delta.x * MOUSE_SENSITIVITY;
        input_state.pitch -= delta.y * MOUSE_SENSITIVITY;
        input_state.pitch = input_state.pitch.clamp(-FRAC_PI_2 + 0.01, FRAC_PI_2 - 0.01);
    }
}

/// Send input to server
pub fn send_input_to_server(
    input_state: Res<InputState>,
    // In Lightyear 0.25, send messages via MessageSender component - typed on message type
    mut client_query: Query<
        &mut MessageSender<PlayerInput>,
        (With<crate::GameClient>, With<Connected>),
    >,
    time: Res<Time>,
    mut last_warn_time: Local<f32>,
) {
    let Ok(mut sender) = client_query.single_mut() else {
        // If this fires, input will *never* reach the server, so movement will be frozen.
        let now = time.elapsed_secs();
        if now - *last_warn_time > 1.0 {
            warn!("send_input_to_server: missing GameClient+Connected+MessageSender<PlayerInput>; not sending inputs");
            *last_warn_time = now;
        }
        return;
    };

    let input = PlayerInput {
        forward: input_state.forward,
        backward: input_state.backward,
        left: input_state.left,
        right: input_state.right,
        jump: input_state.jump,
        sprint: input_state.sprint,
        crouch: input_state.crouch,
        yaw: input_state.yaw,
    };

    let _ = sender.send::<InputChannel>(input);
}
