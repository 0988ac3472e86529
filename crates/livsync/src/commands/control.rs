//! Write commands: power, brightness, color, LED, refill reset, refresh.

use livsync_core::{Command, CommandResult, Coordinator, DeviceState, Rgb, brightness_to_native};

use crate::cli::{
    BrightnessArgs, BrightnessScale, ColorArgs, DeviceArgs, GlobalOpts, RefreshArgs, StatusArgs,
    SwitchArgs,
};
use crate::error::CliError;
use crate::output;

use super::status::{self, DeviceView};

pub async fn power(
    coordinator: &Coordinator,
    args: SwitchArgs,
    global: &GlobalOpts,
) -> Result<(), CliError> {
    let DeviceArgs { node, device } = args.target;
    let cmd = Command::SetPower {
        node_id: node.clone(),
        device: device.clone(),
        on: args.state.is_on(),
    };
    run(coordinator, cmd, &node, &device, global).await
}

pub async fn brightness(
    coordinator: &Coordinator,
    args: BrightnessArgs,
    global: &GlobalOpts,
) -> Result<(), CliError> {
    let native = native_brightness(args.value, args.scale)?;
    let DeviceArgs { node, device } = args.target;
    let cmd = Command::SetBrightness {
        node_id: node.clone(),
        device: device.clone(),
        brightness: native,
    };
    run(coordinator, cmd, &node, &device, global).await
}

pub async fn color(
    coordinator: &Coordinator,
    args: ColorArgs,
    global: &GlobalOpts,
) -> Result<(), CliError> {
    let color: Rgb = args.color.parse().map_err(|e| CliError::Validation {
        field: "color".into(),
        reason: format!("{e}"),
    })?;
    let DeviceArgs { node, device } = args.target;
    let cmd = Command::SetColor {
        node_id: node.clone(),
        device: device.clone(),
        color,
    };
    run(coordinator, cmd, &node, &device, global).await
}

pub async fn led(
    coordinator: &Coordinator,
    args: SwitchArgs,
    global: &GlobalOpts,
) -> Result<(), CliError> {
    let DeviceArgs { node, device } = args.target;
    let cmd = Command::SetLed {
        node_id: node.clone(),
        device: device.clone(),
        on: args.state.is_on(),
    };
    run(coordinator, cmd, &node, &device, global).await
}

pub async fn reset_refill(
    coordinator: &Coordinator,
    args: DeviceArgs,
    global: &GlobalOpts,
) -> Result<(), CliError> {
    let DeviceArgs { node, device } = args;
    let cmd = Command::ResetRefill {
        node_id: node.clone(),
        device: device.clone(),
    };
    run(coordinator, cmd, &node, &device, global).await
}

/// Poll the node now and print its devices.
pub async fn refresh(
    coordinator: &Coordinator,
    args: RefreshArgs,
    global: &GlobalOpts,
) -> Result<(), CliError> {
    coordinator
        .execute(Command::Refresh {
            node_id: args.node.clone(),
        })
        .await?;
    status::handle(
        coordinator,
        &StatusArgs {
            node: Some(args.node),
        },
        global,
    )
}

// ── Helpers ──────────────────────────────────────────────────────────

/// Convert a brightness given on `scale` to the hub's 0-100 scale.
fn native_brightness(value: u16, scale: BrightnessScale) -> Result<u8, CliError> {
    let max = match scale {
        BrightnessScale::Percent => 100,
        BrightnessScale::Byte => 255,
    };
    let out_of_range = || CliError::Validation {
        field: "brightness".into(),
        reason: format!("{value} is outside 0-{max}"),
    };
    if value > max {
        return Err(out_of_range());
    }
    let value = u8::try_from(value).map_err(|_| out_of_range())?;
    Ok(match scale {
        BrightnessScale::Percent => value,
        BrightnessScale::Byte => brightness_to_native(value),
    })
}

async fn run(
    coordinator: &Coordinator,
    cmd: Command,
    node: &str,
    device: &str,
    global: &GlobalOpts,
) -> Result<(), CliError> {
    let state = match coordinator.execute(cmd).await? {
        CommandResult::State(state) => state,
        CommandResult::Refreshed => return Ok(()),
    };
    print_state(node, device, state, global)
}

fn print_state(
    node: &str,
    device: &str,
    state: DeviceState,
    global: &GlobalOpts,
) -> Result<(), CliError> {
    let view = DeviceView::new(node, device, state);
    let color = output::should_color(global.color);
    let out = output::render_single(
        global.output,
        &view,
        |v| status::detail(v, color),
        |v| format!("{}/{}", v.node_id, v.device),
    )?;
    output::print_output(&out, global.quiet);
    Ok(())
}
