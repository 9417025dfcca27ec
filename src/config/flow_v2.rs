// src/config/flow_v2.rs
//
// Patch-based normalizing flow (v2) on top of the default score-model config.

use super::{get_default_config, BaseDistribution, Config, PatchConfig};

pub fn get_config() -> Config {
    let mut config = get_default_config();

    config.training.batch_size = 64;
    config.training.log_freq = 5;
    config.training.use_fp16 = true;

    config.eval.batch_size = 64;

    let flow = &mut config.flow;
    flow.base_distribution = BaseDistribution::MultivariateNormal;
    flow.num_blocks = 20;
    flow.context_embedding_size = 128;
    flow.use_global_context = true;
    flow.global_embedding_size = 512;
    flow.input_norm = false;

    flow.patch_batch_size = 32;
    flow.patches_per_train_step = 256;
    flow.training_kimg = 50;

    flow.local_patch_config = PatchConfig {
        kernel_size: 3,
        padding: 1,
        stride: 1,
    };

    // Global context: wide kernel, coarse stride
    flow.global_patch_config = PatchConfig {
        kernel_size: 17,
        padding: 0,
        stride: 8,
    };

    config
}
